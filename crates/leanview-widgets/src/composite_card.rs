#![forbid(unsafe_code)]

//! Story card: brand-coloured header, lean-aware summary, tags.
//!
//! The body is a nested `lean-block`, so when the variant block is defined
//! on the runtime the card body becomes an activatable content block.
//!
//! # Failure Modes
//!
//! Brand colours come from the store and are checked on every render. A
//! colour that is not `#rgb`/`#rrggbb` fails the render, which leaves the
//! previous card markup in place.

use std::sync::LazyLock;

use leanview_core::{Attributes, LeanAxis};
use leanview_runtime::{AppState, Changed, Component, ComponentError, ComponentKind, RenderContext, StatePatch};
use leanview_template::{Template, TemplateData, Value, VariantMap};

use crate::markup::{escape, is_hex_color};

static TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::compile(concat!(
        r#"<article class="lean-card{{#if featured}} lean-card--featured{{/if}}" aria-labelledby="{{id}}-title">"#,
        r#"<header style="background: {{primary}}; border-color: {{secondary}};">"#,
        r#"<h3 id="{{id}}-title">{{title}}</h3>{{#if featured}}<span class="lean-badge">Featured</span>{{/if}}</header>"#,
        r#"<lean-block id="{{id}}-block" axis="{{axis}}">"#,
        r#"{{#if summary}}<p class="lean-summary" data-variants="{{summary}}">{{summary_text}}</p>{{/if}}{{content}}"#,
        r#"</lean-block>"#,
        r#"{{#if has_tags}}<ul class="lean-tags">{{#each tags}}<li>{{tag}}</li>{{/each}}</ul>{{/if}}</article>"#,
    ))
});

#[derive(Debug, Clone, Default)]
pub struct CompositeCard {
    title: String,
    summary: VariantMap,
    tags: Vec<String>,
    featured: bool,
    axis: LeanAxis,
    content: String,
}

impl CompositeCard {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub const fn is_featured(&self) -> bool {
        self.featured
    }

    pub fn set_featured(&mut self, featured: bool) {
        self.featured = featured;
    }
}

fn checked_color<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ComponentError> {
    if is_hex_color(value) {
        Ok(value)
    } else {
        Err(ComponentError::InvalidData {
            field,
            reason: format!("{value:?} is not a hex colour"),
        })
    }
}

impl Component for CompositeCard {
    fn kind(&self) -> ComponentKind {
        ComponentKind::CompositeCard
    }

    fn interest(&self) -> Changed {
        Changed::BRAND | Changed::LEAN_LEVEL
    }

    fn configure(&mut self, attrs: &Attributes, _state: &AppState) -> Option<StatePatch> {
        self.title = attrs.text("title").unwrap_or_default().to_owned();
        self.summary = VariantMap::parse(attrs.get("summary").unwrap_or_default());
        self.tags = attrs.list("tags");
        self.featured = attrs.flag("featured");
        self.axis = LeanAxis::by_name_or_default(attrs.text("axis"));
        None
    }

    fn adopt_children(&mut self, markup: String) {
        self.content = markup;
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError> {
        let primary = checked_color(&ctx.state.brand_primary, "brand_primary")?;
        let secondary = checked_color(&ctx.state.brand_secondary, "brand_secondary")?;
        let tags: Vec<TemplateData> = self
            .tags
            .iter()
            .map(|tag| TemplateData::new().with("tag", escape(tag)))
            .collect();
        let data = TemplateData::new()
            .with("id", ctx.id_prefix)
            .with("title", escape(&self.title))
            .with("featured", self.featured)
            .with("primary", primary)
            .with("secondary", secondary)
            .with("axis", self.axis.name.as_str())
            .with("summary", escape(&self.summary.encode()))
            .with("summary_text", escape(self.summary.resolve(ctx.state.lean_level)))
            .with("content", self.content.trim())
            .with("has_tags", !tags.is_empty())
            .with("tags", Value::List(tags));
        Ok(TEMPLATE.render(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant_block::VariantBlock;
    use leanview_core::{Document, LeanLevel, NodeId};
    use leanview_runtime::{Runtime, RuntimeConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn template_is_well_formed() {
        assert!(TEMPLATE.is_well_formed(), "{:?}", TEMPLATE.diagnostics());
    }

    const CARD: &str = r#"<lean-card id=c title="Rate decision" summary="0:Rates steady|2:Rates frozen again|-2:Relief delayed" tags="economy, rates," featured></lean-card>"#;

    fn mount() -> (Runtime, NodeId) {
        let rt = Runtime::new(Document::from_html(CARD), RuntimeConfig::default());
        rt.define::<VariantBlock>("lean-block");
        let host = rt.document().find_by_id("c").expect("host");
        rt.attach(host, CompositeCard::default()).expect("attach");
        (rt, host)
    }

    #[test]
    fn renders_header_summary_and_tags() {
        let (rt, host) = mount();
        let doc = rt.document();
        let html = doc.inner_html(host);
        assert!(html.contains(r#"class="lean-card lean-card--featured""#), "{html}");
        assert!(html.contains(r#"style="background: #1d4ed8; border-color: #b91c1c;""#), "{html}");
        let tags: Vec<String> = doc
            .query_all(host, |el| el.tag() == "li")
            .into_iter()
            .map(|li| doc.text_content(li))
            .collect();
        assert_eq!(tags, vec!["economy", "rates"]);
        let summary = doc.query_all(host, |el| el.attr("class") == Some("lean-summary lean-neutral"));
        assert_eq!(summary.len(), 1);
        assert_eq!(doc.text_content(summary[0]), "Rates steady");
    }

    #[test]
    fn nested_block_is_upgraded_and_follows_level() {
        let (rt, host) = mount();
        let block_host = rt.document().find_by_id("c-block").expect("nested host");
        let block = rt.unit_at(block_host).expect("nested unit");
        assert!(rt.document().find_by_id("c-block-body").is_some());

        rt.set_state(StatePatch::new().lean_level(LeanLevel::MIN));
        let doc = rt.document();
        let body = doc.find_by_id("c-block-body").expect("body");
        assert_eq!(doc.text_content(body), "Relief delayed");
        assert_eq!(doc.attr(body, "data-level"), Some("-2"));
        drop(doc);
        assert_eq!(rt.units().len(), 2);
        assert_eq!(rt.unit_at(block_host), Some(block), "nested unit survives the card render");
        assert!(rt.document().contains(host, block_host));
        assert!(rt.document().contains(host, body));
    }

    #[test]
    fn invalid_brand_keeps_previous_card() {
        let (rt, host) = mount();
        let unit = rt.unit_at(host).expect("card unit");
        let before = rt.document().inner_html(host);
        rt.set_state(StatePatch::new().brand_primary("javascript:alert(1)"));
        assert_eq!(rt.document().inner_html(host), before);
        assert_eq!(rt.render_count(unit), 1);

        rt.set_state(StatePatch::new().brand_primary("#00ff00"));
        assert!(rt.document().inner_html(host).contains("background: #00ff00;"));
    }
}
