#![forbid(unsafe_code)]

//! Observable application state and the component runtime.
//!
//! - [`store`]: the single state store with ordered, tear-free fan-out.
//! - [`component`]: the unit contract and its contexts.
//! - [`runtime`]: mounting, rendering, input routing and host events.
//! - [`scheduler`]: virtual-time timers for simulated latency.
//! - [`content`]: activatable wrappers in external content payloads.
//! - [`preferences`]: theme persistence.
//! - [`config`]: runtime settings with environment overrides.

pub mod component;
pub mod config;
pub mod content;
pub mod preferences;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use component::{
    BindContext, Component, ComponentError, ComponentKind, EventContext, Lifecycle, Reaction, RenderContext, UnitId,
};
pub use config::RuntimeConfig;
pub use preferences::{FileStorage, MemoryStorage, StorageBackend, StorageError, Theme, ThemePreference};
pub use runtime::{Handle, Runtime, RuntimeError, event_names, record_events};
pub use scheduler::{Scheduler, TimerId};
pub use store::{AppState, Changed, Dispatch, StateChange, StatePatch, Store, Subscription};
