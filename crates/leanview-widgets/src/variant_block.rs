#![forbid(unsafe_code)]

//! Activatable content block labelled with its axis position.
//!
//! The adopted payload is wrapped in a `data-lean-block` element, which the
//! runtime makes focusable and turns into `content-activated` events. A
//! declared `level` pins the block; otherwise it follows the store level.

use std::sync::LazyLock;

use leanview_core::{Attributes, LeanAxis, LeanLevel};
use leanview_runtime::{AppState, Changed, Component, ComponentError, ComponentKind, RenderContext, StatePatch};
use leanview_template::{Template, TemplateData};

use crate::markup::escape;

static TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::compile(concat!(
        r#"<span id="{{id}}-label" class="lean-axis-label {{state_class}}" title="{{axis_label}}">"#,
        r#"{{#if icon}}<span aria-hidden="true">{{icon}}</span> {{/if}}{{level_name}}</span>"#,
        r#"<div id="{{id}}-body" class="lean-block {{state_class}}" data-lean-block data-axis="{{axis}}" data-level="{{level}}" aria-label="{{axis_label}}: {{level_name}}">"#,
        r#"{{content}}</div>"#,
    ))
});

#[derive(Debug, Clone, Default)]
pub struct VariantBlock {
    axis: LeanAxis,
    pinned: Option<LeanLevel>,
    content: String,
}

impl VariantBlock {
    /// Level shown for the store level `current`.
    #[must_use]
    pub fn level(&self, current: LeanLevel) -> LeanLevel {
        self.pinned.unwrap_or(current)
    }

    #[must_use]
    pub fn axis(&self) -> &LeanAxis {
        &self.axis
    }
}

impl Component for VariantBlock {
    fn kind(&self) -> ComponentKind {
        ComponentKind::VariantBlock
    }

    fn interest(&self) -> Changed {
        Changed::LEAN_LEVEL
    }

    fn configure(&mut self, attrs: &Attributes, _state: &AppState) -> Option<StatePatch> {
        self.axis = LeanAxis::by_name_or_default(attrs.text("axis"));
        self.pinned = attrs.level("level");
        None
    }

    fn adopt_children(&mut self, markup: String) {
        self.content = markup;
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError> {
        let level = self.level(ctx.state.lean_level);
        let info = self.axis.info(level);
        let data = TemplateData::new()
            .with("id", ctx.id_prefix)
            .with("state_class", level.state_class())
            .with("axis", self.axis.name.as_str())
            .with("axis_label", escape(&self.axis.label))
            .with("icon", info.icon.as_deref().unwrap_or_default())
            .with("level_name", escape(&info.name))
            .with("level", level.to_string())
            .with("content", self.content.trim());
        Ok(TEMPLATE.render(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leanview_core::{Document, HostEventDetail, KeyCode, KeyEvent};
    use leanview_runtime::{Runtime, RuntimeConfig, event_names, record_events};
    use pretty_assertions::assert_eq;

    #[test]
    fn template_is_well_formed() {
        assert!(TEMPLATE.is_well_formed(), "{:?}", TEMPLATE.diagnostics());
    }

    fn mount(markup: &str) -> Runtime {
        let rt = Runtime::new(Document::from_html(markup), RuntimeConfig::default().preview_chars(12));
        let host = rt.document().find_by_id("b").expect("host");
        rt.attach(host, VariantBlock::default()).expect("attach");
        rt
    }

    #[test]
    fn wraps_content_in_activatable_block() {
        let rt = mount(r#"<lean-block id=b axis="junior-senior"><p>Hello <span data-variants="0:team|-2:folks">team</span></p></lean-block>"#);
        let doc = rt.document();
        let body = doc.find_by_id("b-body").expect("body");
        assert_eq!(doc.attr(body, "tabindex"), Some("0"));
        assert_eq!(doc.attr(body, "role"), Some("button"));
        assert_eq!(doc.attr(body, "data-axis"), Some("junior-senior"));
        let label = doc.find_by_id("b-label").expect("label");
        assert!(doc.text_content(label).ends_with("Professional"));
    }

    #[test]
    fn follows_store_level_unless_pinned() {
        let rt = mount(r#"<lean-block id=b><p>Hello <span data-variants="0:team|-2:folks">team</span></p></lean-block><lean-block id=pinned level="1"></lean-block>"#);
        let pinned_host = rt.document().find_by_id("pinned").expect("pinned");
        rt.attach(pinned_host, VariantBlock::default()).expect("attach pinned");

        rt.set_state(StatePatch::new().lean_level(LeanLevel::MIN));
        let doc = rt.document();
        let body = doc.find_by_id("b-body").expect("body");
        assert_eq!(doc.text_content(body), "Hello folks");
        assert_eq!(doc.attr(body, "data-level"), Some("-2"));
        let pinned_body = doc.find_by_id("pinned-body").expect("pinned body");
        assert_eq!(doc.attr(pinned_body, "data-level"), Some("1"));
        assert!(doc.has_class(pinned_body, "lean-right"));
    }

    #[test]
    fn activation_emits_content_event_with_preview() {
        let rt = mount(r#"<lean-block id=b axis="basic-expert" level="2"><p id=p>A rather long paragraph of text</p></lean-block>"#);
        let log = record_events(&rt, rt.root());
        let p = rt.document().find_by_id("p").expect("paragraph");
        rt.key(p, KeyEvent::new(KeyCode::Enter));
        assert_eq!(event_names(&log), vec!["content-activated"]);
        assert_eq!(
            log.borrow()[0].detail,
            HostEventDetail::ContentActivated {
                axis: "basic-expert".into(),
                level: LeanLevel::MAX,
                preview: "A rather lon…".into(),
                sources: Vec::new(),
            }
        );
    }
}
