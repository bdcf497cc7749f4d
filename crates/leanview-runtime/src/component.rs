#![forbid(unsafe_code)]

//! The unit contract.
//!
//! Every visual unit implements [`Component`]. The runtime drives it through
//! a fixed lifecycle:
//!
//! ```text
//! Detached --attach--> Attached --render--> Rendered <--re-render--+
//!    ^                                         |                    |
//!    +-----------------detach------------------+--------------------+
//! ```
//!
//! Units never touch the store or other units directly. Handlers return a
//! [`Reaction`] describing the store patch, outbound events and whether a
//! local re-render is needed; the runtime applies it after releasing every
//! borrow of the unit.

use std::fmt;

use leanview_core::dom::{Document, NodeId};
use leanview_core::{Attributes, HostEventDetail, KeyEvent, PointerEvent};
use leanview_template::ShapeError;
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::store::{AppState, Changed, StateChange, StatePatch};

/// Runtime-assigned unit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u64);

impl UnitId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Lifecycle state of a mounted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Detached,
    Attached,
    Rendered,
}

/// The unit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    StateDisplay,
    ReactiveList,
    Selector,
    CompositeCard,
    VariantBlock,
}

impl ComponentKind {
    /// Host element tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::StateDisplay => "lean-state",
            Self::ReactiveList => "lean-list",
            Self::Selector => "lean-selector",
            Self::CompositeCard => "lean-card",
            Self::VariantBlock => "lean-block",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StateDisplay => "state-display",
            Self::ReactiveList => "reactive-list",
            Self::Selector => "selector",
            Self::CompositeCard => "composite-card",
            Self::VariantBlock => "variant-block",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A render that could not produce markup. The previous output stays.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("invalid {field}: {reason}")]
    InvalidData { field: &'static str, reason: String },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// What a handler asks the runtime to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Reaction {
    /// The event was consumed; key routing stops here.
    pub handled: bool,
    /// Re-render this unit.
    pub rerender: bool,
    /// Store update, applied after the re-render.
    pub patch: Option<StatePatch>,
    /// Outbound events, dispatched after the patch.
    pub events: Vec<HostEventDetail>,
}

impl Reaction {
    /// Not handled; routing continues to the enclosing unit.
    pub fn ignored() -> Self {
        Self::default()
    }

    /// Handled, nothing else to do.
    pub fn handled() -> Self {
        Self {
            handled: true,
            ..Self::default()
        }
    }

    /// Handled, with a local re-render.
    pub fn rerender() -> Self {
        Self {
            handled: true,
            rerender: true,
            ..Self::default()
        }
    }

    pub fn with_patch(mut self, patch: StatePatch) -> Self {
        self.handled = true;
        self.patch = Some(patch);
        self
    }

    pub fn with_event(mut self, event: HostEventDetail) -> Self {
        self.handled = true;
        self.events.push(event);
        self
    }

    pub fn with_rerender(mut self) -> Self {
        self.handled = true;
        self.rerender = true;
        self
    }
}

/// Inputs to [`Component::render`].
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub unit: UnitId,
    pub state: &'a AppState,
    pub config: &'a RuntimeConfig,
    /// Prefix for ids generated inside the host.
    pub id_prefix: &'a str,
    /// Virtual clock, milliseconds.
    pub now_ms: u64,
}

/// Inputs to [`Component::after_render`]: mutable access to the tree.
pub struct BindContext<'a> {
    pub doc: &'a mut Document,
    pub host: NodeId,
    pub state: &'a AppState,
    pub id_prefix: &'a str,
}

impl BindContext<'_> {
    /// Element `#{id_prefix}-{suffix}` inside the host.
    #[must_use]
    pub fn find(&self, suffix: &str) -> Option<NodeId> {
        self.doc
            .find_by_id_in(self.host, &format!("{}-{suffix}", self.id_prefix))
    }
}

/// Inputs to the input handlers: read-only tree access.
pub struct EventContext<'a> {
    pub doc: &'a Document,
    pub host: NodeId,
    /// The node the input was delivered to.
    pub target: NodeId,
    pub state: &'a AppState,
    pub id_prefix: &'a str,
}

impl EventContext<'_> {
    /// Nearest element from the target up to the host carrying `attr`.
    #[must_use]
    pub fn closest_with_attr(&self, attr: &str) -> Option<(NodeId, &str)> {
        self.doc
            .ancestors_inclusive(self.target)
            .into_iter()
            .take_while(|&n| n != self.host)
            .find_map(|n| self.doc.attr(n, attr).map(|v| (n, v)))
    }
}

/// A visual unit.
pub trait Component: 'static {
    fn kind(&self) -> ComponentKind;

    /// Store fields whose change triggers a re-render.
    fn interest(&self) -> Changed {
        Changed::all()
    }

    /// Read declared attributes at attach. May return a patch seeding the store.
    fn configure(&mut self, attrs: &Attributes, state: &AppState) -> Option<StatePatch>;

    /// Server-rendered inner markup of the host, captured before first render.
    fn adopt_children(&mut self, _markup: String) {}

    /// Produce the host's inner markup.
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError>;

    /// Bind interactions on the freshly rendered subtree.
    fn after_render(&mut self, _ctx: &mut BindContext<'_>) {}

    /// React to a store change in [`interest`](Self::interest).
    fn on_state_change(&mut self, _change: &StateChange) -> Reaction {
        Reaction::rerender()
    }

    fn on_key(&mut self, _ctx: &EventContext<'_>, _key: &KeyEvent) -> Reaction {
        Reaction::ignored()
    }

    fn on_pointer(&mut self, _ctx: &EventContext<'_>, _pointer: &PointerEvent) -> Reaction {
        Reaction::ignored()
    }

    /// Release unit-held resources on detach.
    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use leanview_core::LeanLevel;

    #[test]
    fn reaction_builders_mark_handled() {
        assert!(!Reaction::ignored().handled);
        let r = Reaction::ignored()
            .with_patch(StatePatch::new().lean_level(LeanLevel::MAX))
            .with_event(HostEventDetail::CategoryFilter { category: None });
        assert!(r.handled);
        assert!(!r.rerender);
        assert_eq!(r.events.len(), 1);
        assert!(Reaction::rerender().rerender);
    }

    #[test]
    fn closest_with_attr_stops_at_host() {
        let doc = Document::from_html(
            r#"<div id=host data-position="9"><p data-position="1"><b id=t>x</b></p></div>"#,
        );
        let host = doc.find_by_id("host").expect("host");
        let target = doc.find_by_id("t").expect("target");
        let state = AppState::default();
        let ctx = EventContext {
            doc: &doc,
            host,
            target,
            state: &state,
            id_prefix: "host",
        };
        assert_eq!(ctx.closest_with_attr("data-position").map(|(_, v)| v), Some("1"));
        assert_eq!(ctx.closest_with_attr("id").map(|(_, v)| v), Some("t"));
        let outside = EventContext { target: host, ..ctx };
        assert_eq!(outside.closest_with_attr("data-position"), None);
    }

    #[test]
    fn kinds_map_to_tags() {
        assert_eq!(ComponentKind::Selector.tag(), "lean-selector");
        assert_eq!(ComponentKind::VariantBlock.to_string(), "variant-block");
    }
}
