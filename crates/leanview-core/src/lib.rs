#![forbid(unsafe_code)]

//! Core: lean levels and axes, input events, declared attributes, outbound
//! host events, and the headless view tree.

pub mod attrs;
pub mod axis;
pub mod dom;
pub mod event;
pub mod host_event;
pub mod level;

pub use attrs::Attributes;
pub use axis::{LeanAxis, LevelInfo};
pub use dom::{Document, DomError, NodeId};
pub use event::{InputEvent, KeyCode, KeyEvent, KeyEventKind, Modifiers, PointerEvent};
pub use host_event::{HostEvent, HostEventDetail, HostEventKind, Source};
pub use level::LeanLevel;
