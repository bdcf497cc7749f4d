#![forbid(unsafe_code)]

//! Topic header and lean summary for the current page.
//!
//! Declared attributes (`topic`, `lean-level`, `brand-primary`,
//! `brand-secondary`) seed the store at attach. The server-rendered content
//! inside the host is adopted and re-rendered under the header, so its
//! variant spans follow the active level.

use std::sync::LazyLock;

use leanview_core::{Attributes, HostEventDetail, LeanAxis};
use leanview_runtime::store::{DEFAULT_BRAND_PRIMARY, DEFAULT_BRAND_SECONDARY};
use leanview_runtime::{AppState, Component, ComponentError, ComponentKind, Reaction, RenderContext, StatePatch};
use leanview_template::{Template, TemplateData};

use crate::markup::{escape, is_hex_color};

static TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::compile(concat!(
        r#"<section class="lean-state {{state_class}}" style="--brand-primary: {{primary}}; --brand-secondary: {{secondary}};" data-level="{{level}}">"#,
        r#"<header><h2 id="{{id}}-topic">{{topic}}</h2>"#,
        r#"<span class="lean-axis" title="{{axis_label}}">{{#if icon}}<span aria-hidden="true">{{icon}}</span> {{/if}}{{level_name}}</span>"#,
        r#" <output id="{{id}}-score">{{score}}</output></header>"#,
        r#"{{#if content}}<div class="lean-content">{{content}}</div>{{/if}}</section>"#,
    ))
});

#[derive(Debug, Clone, Default)]
pub struct StateDisplay {
    axis: LeanAxis,
    content: String,
}

impl StateDisplay {
    #[must_use]
    pub fn new(axis: LeanAxis) -> Self {
        Self {
            axis,
            content: String::new(),
        }
    }

    #[must_use]
    pub fn axis(&self) -> &LeanAxis {
        &self.axis
    }

    /// Change the page topic. Emits `topic-change` when the topic differs.
    pub fn set_topic(&mut self, state: &AppState, topic: impl Into<String>) -> Reaction {
        let topic = topic.into();
        let topic = topic.trim();
        if topic.is_empty() || topic == state.topic {
            return Reaction::handled();
        }
        tracing::debug!(message = "state_display.set_topic", from = %state.topic, to = topic);
        Reaction::handled()
            .with_patch(StatePatch::new().topic(topic))
            .with_event(HostEventDetail::TopicChange {
                previous: state.topic.clone(),
                topic: topic.to_owned(),
            })
    }
}

fn brand<'a>(value: &'a str, fallback: &'static str, field: &'static str) -> &'a str {
    if is_hex_color(value) {
        value
    } else {
        tracing::debug!(message = "state_display.brand_fallback", field, value);
        fallback
    }
}

impl Component for StateDisplay {
    fn kind(&self) -> ComponentKind {
        ComponentKind::StateDisplay
    }

    fn configure(&mut self, attrs: &Attributes, _state: &AppState) -> Option<StatePatch> {
        self.axis = LeanAxis::by_name_or_default(attrs.text("axis"));
        let mut patch = StatePatch::new();
        if let Some(topic) = attrs.text("topic") {
            patch = patch.topic(topic);
        }
        if let Some(level) = attrs.level("lean-level") {
            patch = patch.lean_level(level);
        }
        if let Some(color) = attrs.text("brand-primary") {
            patch = patch.brand_primary(color);
        }
        if let Some(color) = attrs.text("brand-secondary") {
            patch = patch.brand_secondary(color);
        }
        Some(patch)
    }

    fn adopt_children(&mut self, markup: String) {
        self.content = markup;
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError> {
        let state = ctx.state;
        let level = state.lean_level;
        let info = self.axis.info(level);
        let data = TemplateData::new()
            .with("id", ctx.id_prefix)
            .with("state_class", level.state_class())
            .with("level", level.to_string())
            .with("primary", brand(&state.brand_primary, DEFAULT_BRAND_PRIMARY, "brand_primary"))
            .with("secondary", brand(&state.brand_secondary, DEFAULT_BRAND_SECONDARY, "brand_secondary"))
            .with("topic", escape(&state.topic))
            .with("axis_label", escape(&self.axis.label))
            .with("icon", info.icon.as_deref().unwrap_or_default())
            .with("level_name", escape(&info.name))
            .with("score", level.signed())
            .with("content", self.content.trim());
        Ok(TEMPLATE.render(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leanview_core::{Document, LeanLevel, NodeId};
    use leanview_runtime::{Runtime, RuntimeConfig, event_names, record_events};
    use pretty_assertions::assert_eq;

    #[test]
    fn template_is_well_formed() {
        assert!(TEMPLATE.is_well_formed(), "{:?}", TEMPLATE.diagnostics());
    }

    fn mount(markup: &str) -> (Runtime, NodeId, leanview_runtime::Handle<StateDisplay>) {
        let rt = Runtime::new(Document::from_html(markup), RuntimeConfig::default());
        let host = rt.document().find_by_id("d").expect("host");
        let handle = rt.attach(host, StateDisplay::default()).expect("attach");
        (rt, host, handle)
    }

    #[test]
    fn attributes_seed_the_store() {
        let (rt, _, _) = mount(
            r##"<lean-state id=d topic="Markets" lean-level="-1" brand-primary="#000000"></lean-state>"##,
        );
        let state = rt.state();
        assert_eq!(state.topic, "Markets");
        assert_eq!(state.lean_level, LeanLevel::new(-1));
        assert_eq!(state.brand_primary, "#000000");
        assert_eq!(state.brand_secondary, DEFAULT_BRAND_SECONDARY);
    }

    #[test]
    fn renders_header_and_adopted_content() {
        let (rt, host, _) = mount(
            r#"<lean-state id=d topic="Markets" axis="basic-expert"><p>Body <span data-variants="0:calm|2:wild">calm</span></p></lean-state>"#,
        );
        let doc = rt.document();
        let topic = doc.find_by_id("d-topic").expect("topic");
        assert_eq!(doc.text_content(topic), "Markets");
        let score = doc.find_by_id("d-score").expect("score");
        assert_eq!(doc.text_content(score), "0");
        let html = doc.inner_html(host);
        assert!(html.contains(r#"style="--brand-primary: #1d4ed8; --brand-secondary: #b91c1c;""#), "{html}");
        assert!(html.contains(r#"class="lean-content"><p>Body <span"#), "{html}");
        assert!(html.contains("Advanced"), "{html}");
    }

    #[test]
    fn level_change_rerenders_score_and_class() {
        let (rt, host, _) = mount(r#"<lean-state id=d></lean-state>"#);
        rt.set_state(StatePatch::new().lean_level(LeanLevel::MAX));
        let doc = rt.document();
        let section = doc.children(host)[0];
        assert!(doc.has_class(section, "lean-strong-right"));
        let score = doc.find_by_id("d-score").expect("score");
        assert_eq!(doc.text_content(score), "+2");
    }

    #[test]
    fn invalid_brand_falls_back_to_default() {
        let (rt, host, _) = mount(r#"<lean-state id=d brand-primary="red;}"></lean-state>"#);
        assert_eq!(rt.state().brand_primary, "red;}");
        assert!(rt.document().inner_html(host).contains("--brand-primary: #1d4ed8;"));
    }

    #[test]
    fn set_topic_patches_store_and_emits() {
        let (rt, host, handle) = mount(r#"<lean-state id=d topic="Markets"></lean-state>"#);
        let log = record_events(&rt, rt.root());
        rt.update(&handle, |display, state| display.set_topic(state, "Climate"))
            .expect("update");
        rt.update(&handle, |display, state| display.set_topic(state, "Climate"))
            .expect("update");
        assert_eq!(rt.state().topic, "Climate");
        assert_eq!(event_names(&log), vec!["topic-change"]);
        assert_eq!(log.borrow()[0].target, host);
        assert_eq!(
            log.borrow()[0].detail,
            HostEventDetail::TopicChange {
                previous: "Markets".into(),
                topic: "Climate".into()
            }
        );
    }
}
