#![forbid(unsafe_code)]

//! Five-position lean selector.
//!
//! A radio group over the five lean levels. The store is the only source of
//! truth for the checked position; the selector never keeps its own copy.
//!
//! # Keyboard
//!
//! | Key | Effect |
//! |-----|--------|
//! | Left / Up | one position lower |
//! | Right / Down | one position higher |
//! | Home / End | lowest / highest |
//! | Enter / Space | re-announce the current position |
//!
//! # Invariants
//!
//! After any transition completes, four things agree: the store level, the
//! focused button (when focus is inside the selector), the ARIA state
//! (`aria-checked`, roving `tabindex`, `aria-activedescendant`) and the
//! live-region text.
//!
//! Moving past either end is a no-op: no store update, no event. Focus
//! still lands on the checked button.

use std::sync::LazyLock;

use leanview_core::{Attributes, HostEventDetail, KeyCode, KeyEvent, LeanAxis, LeanLevel, PointerEvent};
use leanview_runtime::{
    AppState, BindContext, Changed, Component, ComponentError, ComponentKind, EventContext, Reaction, RenderContext,
    StateChange, StatePatch,
};
use leanview_template::{Template, TemplateData, Value};

use crate::markup::escape;

pub const POSITION_ATTR: &str = "data-position";

static TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::compile(concat!(
        r#"<div id="{{id}}-group" class="lean-selector {{state_class}}" role="radiogroup" aria-label="{{label}}" aria-activedescendant="{{active}}">"#,
        r#"{{#each positions}}<button type="button" id="{{id}}" role="radio" aria-checked="{{checked}}" tabindex="{{tabindex}}" data-position="{{value}}" title="{{description}}">{{name}}</button>{{/each}}"#,
        r#"</div><div id="{{id}}-live" class="visually-hidden" role="status" aria-live="polite"></div>"#,
    ))
});

/// Id of the button for `level` inside a selector with `prefix`.
#[must_use]
pub fn position_id(prefix: &str, level: LeanLevel) -> String {
    format!("{prefix}-pos-{}", level.token())
}

#[derive(Debug, Clone, Default)]
pub struct Selector {
    axis: LeanAxis,
    label: Option<String>,
    focus_pending: bool,
    announce_pending: bool,
}

impl Selector {
    #[must_use]
    pub fn new(axis: LeanAxis) -> Self {
        Self {
            axis,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn axis(&self) -> &LeanAxis {
        &self.axis
    }

    /// Live-region text for `level`.
    #[must_use]
    pub fn announcement(&self, level: LeanLevel) -> String {
        format!(
            "{}: {} ({})",
            self.axis.label,
            self.axis.level_name(level),
            level.signed()
        )
    }

    /// Target level for a key press from `current`, `None` for keys the
    /// selector does not move on.
    fn target_for(code: KeyCode, current: LeanLevel) -> Option<LeanLevel> {
        match code {
            KeyCode::Left | KeyCode::Up => Some(current.checked_prev().unwrap_or(current)),
            KeyCode::Right | KeyCode::Down => Some(current.checked_next().unwrap_or(current)),
            KeyCode::Home => Some(LeanLevel::MIN),
            KeyCode::End => Some(LeanLevel::MAX),
            _ => None,
        }
    }

    fn move_to(&mut self, current: LeanLevel, target: LeanLevel, via: &'static str) -> Reaction {
        self.focus_pending = true;
        if target == current {
            tracing::trace!(message = "selector.boundary", level = %current, via);
            return Reaction::rerender();
        }
        tracing::debug!(message = "selector.move", from = %current, to = %target, via);
        self.announce_pending = true;
        Reaction::handled()
            .with_patch(StatePatch::new().lean_level(target))
            .with_event(HostEventDetail::LevelChange {
                previous: current,
                level: target,
            })
    }
}

impl Component for Selector {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Selector
    }

    fn interest(&self) -> Changed {
        Changed::LEAN_LEVEL
    }

    fn configure(&mut self, attrs: &Attributes, _state: &AppState) -> Option<StatePatch> {
        self.axis = LeanAxis::by_name_or_default(attrs.text("axis"));
        self.label = attrs.text("label").map(str::to_owned);
        None
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError> {
        let current = ctx.state.lean_level;
        let positions: Vec<TemplateData> = LeanLevel::ALL
            .iter()
            .map(|&level| {
                let checked = level == current;
                let info = self.axis.info(level);
                TemplateData::new()
                    .with("id", position_id(ctx.id_prefix, level))
                    .with("checked", if checked { "true" } else { "false" })
                    .with("tabindex", if checked { "0" } else { "-1" })
                    .with("value", level.to_string())
                    .with("name", escape(&info.name))
                    .with("description", escape(&info.description))
            })
            .collect();
        let label = self.label.as_deref().unwrap_or(&self.axis.label);
        let data = TemplateData::new()
            .with("id", ctx.id_prefix)
            .with("label", escape(label))
            .with("state_class", current.state_class())
            .with("active", position_id(ctx.id_prefix, current))
            .with("positions", Value::List(positions));
        Ok(TEMPLATE.render(&data))
    }

    fn after_render(&mut self, ctx: &mut BindContext<'_>) {
        let level = ctx.state.lean_level;
        let checked = ctx.doc.find_by_id_in(ctx.host, &position_id(ctx.id_prefix, level));
        if let Some(button) = checked
            && (std::mem::take(&mut self.focus_pending) || ctx.doc.focus_within(ctx.host))
        {
            ctx.doc.focus(button);
        }
        if std::mem::take(&mut self.announce_pending)
            && let Some(region) = ctx.find("live")
        {
            let text = self.announcement(level);
            if let Err(err) = ctx.doc.announce(region, &text) {
                tracing::warn!(message = "selector.announce_failed", error = %err);
            }
        }
    }

    fn on_state_change(&mut self, change: &StateChange) -> Reaction {
        if change.old.lean_level != change.new.lean_level {
            self.announce_pending = true;
        }
        Reaction::rerender()
    }

    fn on_key(&mut self, ctx: &EventContext<'_>, key: &KeyEvent) -> Reaction {
        let current = ctx.state.lean_level;
        if key.code.is_activation() {
            tracing::trace!(message = "selector.reannounce", level = %current);
            self.focus_pending = true;
            self.announce_pending = true;
            return Reaction::rerender();
        }
        match Self::target_for(key.code, current) {
            Some(target) => self.move_to(current, target, "key"),
            None => Reaction::ignored(),
        }
    }

    fn on_pointer(&mut self, ctx: &EventContext<'_>, pointer: &PointerEvent) -> Reaction {
        if !pointer.is_activation() {
            return Reaction::ignored();
        }
        let Some((_, raw)) = ctx.closest_with_attr(POSITION_ATTR) else {
            return Reaction::ignored();
        };
        let Some(target) = LeanLevel::parse(raw) else {
            tracing::debug!(message = "selector.bad_position", raw);
            return Reaction::ignored();
        };
        self.move_to(ctx.state.lean_level, target, "pointer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leanview_core::{Document, NodeId};
    use leanview_runtime::{Runtime, RuntimeConfig, event_names, record_events};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    #[test]
    fn template_is_well_formed() {
        assert!(TEMPLATE.is_well_formed(), "{:?}", TEMPLATE.diagnostics());
    }

    fn mounted() -> (Runtime, NodeId) {
        let rt = Runtime::new(
            Document::from_html(r#"<lean-selector id=sel axis="junior-senior"></lean-selector>"#),
            RuntimeConfig::default(),
        );
        let host = rt.document().find_by_id("sel").expect("host");
        rt.attach(host, Selector::default()).expect("attach");
        (rt, host)
    }

    fn checked_ids(rt: &Runtime, host: NodeId) -> Vec<String> {
        let doc = rt.document();
        doc.query_all(host, |el| el.attr("aria-checked") == Some("true"))
            .into_iter()
            .filter_map(|n| doc.attr(n, "id").map(str::to_owned))
            .collect()
    }

    #[test]
    fn renders_radiogroup_for_current_level() {
        let (rt, host) = mounted();
        assert_eq!(checked_ids(&rt, host), vec!["sel-pos-0"]);
        let doc = rt.document();
        let group = doc.find_by_id("sel-group").expect("group");
        assert_eq!(doc.attr(group, "role"), Some("radiogroup"));
        assert_eq!(doc.attr(group, "aria-label"), Some("Experience Level"));
        assert_eq!(doc.attr(group, "aria-activedescendant"), Some("sel-pos-0"));
        let live = doc.find_by_id("sel-live").expect("live");
        assert_eq!(doc.attr(live, "aria-live"), Some("polite"));
        let tabbable = doc.query_all(host, |el| el.attr("tabindex") == Some("0"));
        assert_eq!(tabbable.len(), 1);
        assert!(doc.announcements().is_empty(), "no announcement before any transition");
    }

    #[test]
    fn arrow_moves_store_focus_aria_and_live_region_together() {
        let (rt, host) = mounted();
        let log = record_events(&rt, rt.root());
        let start = rt.document().find_by_id("sel-pos-0").expect("button");
        assert!(rt.key(start, KeyEvent::new(KeyCode::Right)));

        assert_eq!(rt.state().lean_level, LeanLevel::new(1));
        assert_eq!(checked_ids(&rt, host), vec!["sel-pos-p1"]);
        let doc = rt.document();
        let focused = doc.focused().expect("focused");
        assert_eq!(doc.attr(focused, "id"), Some("sel-pos-p1"));
        assert_eq!(doc.attr(focused, "tabindex"), Some("0"));
        let group = doc.find_by_id("sel-group").expect("group");
        assert_eq!(doc.attr(group, "aria-activedescendant"), Some("sel-pos-p1"));
        assert_eq!(
            doc.last_announcement().map(|a| a.text.as_str()),
            Some("Experience Level: Senior (+1)")
        );
        assert_eq!(event_names(&log), vec!["level-change"]);
    }

    #[test]
    fn boundary_moves_are_noops() {
        let (rt, _host) = mounted();
        rt.set_state(StatePatch::new().lean_level(LeanLevel::MIN));
        let log = record_events(&rt, rt.root());
        let version = rt.store().version();
        let lowest = rt.document().find_by_id("sel-pos-n2").expect("button");
        assert!(rt.key(lowest, KeyEvent::new(KeyCode::Left)));
        // The boundary re-render rebuilt the buttons and refocused the checked one.
        assert!(rt.press(KeyEvent::new(KeyCode::Home)));
        let doc = rt.document();
        let focused = doc.focused().expect("focus on checked button");
        assert_eq!(doc.attr(focused, "id"), Some("sel-pos-n2"));
        drop(doc);
        assert_eq!(rt.store().version(), version);
        assert!(log.borrow().is_empty());
        assert_eq!(rt.state().lean_level, LeanLevel::MIN);
    }

    #[test]
    fn enter_reannounces_without_changing_level() {
        let (rt, _host) = mounted();
        let button = rt.document().find_by_id("sel-pos-0").expect("button");
        let version = rt.store().version();
        assert!(rt.key(button, KeyEvent::new(KeyCode::Enter)));
        assert!(rt.press(KeyEvent::new(KeyCode::Char(' '))));
        assert_eq!(rt.store().version(), version);
        let doc = rt.document();
        let texts: Vec<&str> = doc.announcements().iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["Experience Level: Professional (0)"; 2]);
    }

    #[test]
    fn click_sets_level_directly() {
        let (rt, host) = mounted();
        let far = rt.document().find_by_id("sel-pos-n2").expect("button");
        assert!(rt.click(far));
        assert_eq!(rt.state().lean_level, LeanLevel::MIN);
        assert_eq!(checked_ids(&rt, host), vec!["sel-pos-n2"]);
    }

    #[test]
    fn external_store_change_updates_aria_without_stealing_focus() {
        let (rt, host) = mounted();
        rt.set_state(StatePatch::new().lean_level(LeanLevel::MAX));
        assert_eq!(checked_ids(&rt, host), vec!["sel-pos-p2"]);
        assert_eq!(rt.document().focused(), None);
        assert_eq!(
            rt.document().last_announcement().map(|a| a.text.clone()),
            Some("Experience Level: Executive (+2)".to_owned())
        );
    }

    // =========================================================================
    // Tracing
    // =========================================================================

    #[derive(Default)]
    struct SelectorTraceState {
        saw_render_span: bool,
        moves: Vec<String>,
    }

    struct SelectorTraceCapture {
        state: Arc<Mutex<SelectorTraceState>>,
    }

    impl<S> Layer<S> for SelectorTraceCapture
    where
        S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
    {
        fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, _id: &tracing::Id, _ctx: Context<'_, S>) {
            if attrs.metadata().name() == "component.render" {
                self.state.lock().expect("selector trace lock").saw_render_span = true;
            }
        }

        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            #[derive(Default)]
            struct Fields {
                message: Option<String>,
                to: Option<String>,
            }
            impl tracing::field::Visit for Fields {
                fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                    if field.name() == "message" {
                        self.message = Some(value.to_string());
                    }
                }

                fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                    let text = format!("{value:?}").trim_matches('"').to_string();
                    match field.name() {
                        "message" => self.message = Some(text),
                        "to" => self.to = Some(text),
                        _ => {}
                    }
                }
            }
            let mut fields = Fields::default();
            event.record(&mut fields);
            if fields.message.as_deref() == Some("selector.move") {
                self.state
                    .lock()
                    .expect("selector trace lock")
                    .moves
                    .push(fields.to.unwrap_or_default());
            }
        }
    }

    #[test]
    fn selector_move_events_and_render_span_emitted() {
        let state = Arc::new(Mutex::new(SelectorTraceState::default()));
        let subscriber = tracing_subscriber::registry().with(SelectorTraceCapture {
            state: Arc::clone(&state),
        });
        let _guard = tracing::subscriber::set_default(subscriber);

        let (rt, _host) = mounted();
        let button = rt.document().find_by_id("sel-pos-0").expect("button");
        rt.key(button, KeyEvent::new(KeyCode::End));
        rt.press(KeyEvent::new(KeyCode::End));
        rt.press(KeyEvent::new(KeyCode::Left));

        let snapshot = state.lock().expect("selector trace lock");
        assert!(snapshot.saw_render_span, "expected component.render span");
        assert_eq!(snapshot.moves, vec!["2", "1"], "boundary End is not a move");
    }
}
