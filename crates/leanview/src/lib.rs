#![forbid(unsafe_code)]

//! LeanView public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use leanview_core::{Document, HostEvent, HostEventDetail, KeyCode, KeyEvent, LeanAxis, LeanLevel, NodeId};
pub use leanview_runtime::{AppState, Runtime, RuntimeConfig, StatePatch, Store, Theme};

pub mod prelude {
    pub use leanview_core as core;
    pub use leanview_runtime as runtime;
    pub use leanview_template as template;
    #[cfg(feature = "widgets")]
    pub use leanview_widgets as widgets;

    pub use leanview_core::{Document, KeyCode, KeyEvent, LeanLevel, NodeId};
    pub use leanview_runtime::{Component, Reaction, Runtime, RuntimeConfig, StatePatch};
    #[cfg(feature = "widgets")]
    pub use leanview_widgets::define_all;
}
