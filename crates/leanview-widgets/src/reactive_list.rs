#![forbid(unsafe_code)]

//! Filterable item list with simulated loading.
//!
//! Items arrive through [`load`] or [`load_json`]: the list enters a loading
//! state immediately and the items land after the configured delay. A second
//! load while one is pending replaces it; only the latest request's items
//! are ever shown.
//!
//! Category buttons toggle a filter and emit `category-filter` with the new
//! filter (`None` when cleared).
//!
//! # Failure Modes
//!
//! Item data is validated before anything is scheduled. A rejected batch
//! leaves the list untouched.

use std::sync::LazyLock;

use leanview_core::{Attributes, HostEventDetail, KeyEvent, PointerEvent};
use leanview_runtime::{
    AppState, Changed, Component, ComponentError, ComponentKind, EventContext, Handle, Reaction, RenderContext, Runtime,
    RuntimeError, StatePatch,
};
use leanview_template::{Template, TemplateData, Value, VariantMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markup::escape;

pub const CATEGORY_ATTR: &str = "data-category";
const LOAD_TIMER: &str = "load";

static TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::compile(concat!(
        r#"<div class="lean-list" aria-busy="{{busy}}"><h3 id="{{id}}-title">{{title}}</h3>"#,
        r#"{{#if has_categories}}<div role="toolbar" aria-label="Categories">"#,
        r#"{{#each categories}}<button type="button" data-category="{{name}}" aria-pressed="{{pressed}}">{{name}}</button>{{/each}}"#,
        r#"</div>{{/if}}"#,
        r#"{{#if loading}}<p class="lean-loading" role="status">Loading…</p>{{/if}}"#,
        r#"{{#if has_items}}<ul id="{{id}}-items">{{#each items}}<li data-item-category="{{category}}">"#,
        r#"{{#if variants}}<span data-variants="{{variants}}">{{title}}</span>{{/if}}{{#if plain}}{{title}}{{/if}}"#,
        r#"</li>{{/each}}</ul>{{/if}}"#,
        r#"{{#if empty}}<p class="lean-empty">{{empty_text}}</p>{{/if}}</div>"#,
    ))
});

/// One list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    pub category: String,
    /// Optional per-level titles in `data-variants` encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<String>,
}

impl ListItem {
    #[must_use]
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            variants: None,
        }
    }

    #[must_use]
    pub fn with_variants(mut self, encoded: impl Into<String>) -> Self {
        self.variants = Some(encoded.into());
        self
    }

    /// Reject entries that cannot be rendered faithfully.
    pub fn validate(&self) -> Result<(), ComponentError> {
        if self.title.trim().is_empty() {
            return Err(invalid("title", "must not be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(invalid("category", "must not be empty"));
        }
        if self.category.contains('"') {
            return Err(invalid("category", "must not contain quotes"));
        }
        if let Some(encoded) = &self.variants {
            if encoded.contains('"') {
                return Err(invalid("variants", "must not contain quotes"));
            }
            if VariantMap::parse(encoded).is_empty() {
                return Err(invalid("variants", "no usable level:text pair"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ComponentError {
    ComponentError::InvalidData {
        field,
        reason: reason.to_owned(),
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("item data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("item {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: ComponentError,
    },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Where the list is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPhase {
    /// Nothing requested yet.
    #[default]
    Idle,
    Loading {
        request: u64,
    },
    Ready,
}

#[derive(Debug, Clone, Default)]
pub struct ReactiveList {
    title: String,
    filter: Option<String>,
    delay_ms: Option<u64>,
    items: Vec<ListItem>,
    phase: ListPhase,
    requests: u64,
}

impl ReactiveList {
    #[must_use]
    pub fn phase(&self) -> ListPhase {
        self.phase
    }

    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    #[must_use]
    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    /// Distinct categories in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.category.as_str()) {
                seen.push(&item.category);
            }
        }
        seen
    }

    /// Items passing the active filter.
    pub fn visible(&self) -> impl Iterator<Item = &ListItem> {
        self.items
            .iter()
            .filter(|item| self.filter.as_deref().is_none_or(|f| f == item.category))
    }

    /// Enter the loading state; returns the request id to complete.
    pub fn begin_load(&mut self) -> u64 {
        self.requests += 1;
        if let ListPhase::Loading { request } = self.phase {
            tracing::debug!(message = "list.load_replaced", request);
        }
        self.phase = ListPhase::Loading {
            request: self.requests,
        };
        self.requests
    }

    /// Land the items for `request`. Stale requests are ignored.
    pub fn finish_load(&mut self, request: u64, items: Vec<ListItem>) -> bool {
        if self.phase != (ListPhase::Loading { request }) {
            tracing::debug!(message = "list.stale_load", request);
            return false;
        }
        tracing::debug!(message = "list.loaded", request, items = items.len());
        self.items = items;
        self.phase = ListPhase::Ready;
        if let Some(filter) = &self.filter
            && !self.items.iter().any(|i| i.category == *filter)
        {
            tracing::debug!(message = "list.filter_kept", category = %filter);
        }
        true
    }

    /// Toggle `category` as the filter and report the new filter.
    pub fn toggle_category(&mut self, category: &str) -> Reaction {
        self.filter = if self.filter.as_deref() == Some(category) {
            None
        } else {
            Some(category.to_owned())
        };
        tracing::debug!(message = "list.filter", category = ?self.filter);
        Reaction::rerender().with_event(HostEventDetail::CategoryFilter {
            category: self.filter.clone(),
        })
    }

    fn activate(&mut self, ctx: &EventContext<'_>) -> Reaction {
        match ctx.closest_with_attr(CATEGORY_ATTR) {
            Some((_, category)) => {
                let category = category.to_owned();
                self.toggle_category(&category)
            }
            None => Reaction::ignored(),
        }
    }
}

impl Component for ReactiveList {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ReactiveList
    }

    fn interest(&self) -> Changed {
        Changed::LEAN_LEVEL
    }

    fn configure(&mut self, attrs: &Attributes, _state: &AppState) -> Option<StatePatch> {
        self.title = attrs.text("title").unwrap_or("Items").to_owned();
        self.filter = attrs.text("category").map(str::to_owned);
        self.delay_ms = attrs.u64("delay-ms");
        None
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ComponentError> {
        let categories: Vec<TemplateData> = self
            .categories()
            .into_iter()
            .map(|name| {
                TemplateData::new()
                    .with("name", escape(name))
                    .with("pressed", if self.filter.as_deref() == Some(name) { "true" } else { "false" })
            })
            .collect();
        let items: Vec<TemplateData> = self
            .visible()
            .map(|item| {
                let mut data = TemplateData::new()
                    .with("title", escape(&item.title))
                    .with("category", escape(&item.category));
                match &item.variants {
                    Some(encoded) => data.insert("variants", encoded.as_str()),
                    None => data.insert("plain", true),
                };
                data
            })
            .collect();
        let loading = matches!(self.phase, ListPhase::Loading { .. });
        let empty_text = match (self.phase, &self.filter) {
            (ListPhase::Ready, Some(filter)) => format!("No items in {}", escape(filter)),
            (ListPhase::Ready, None) => "No items".to_owned(),
            _ => String::new(),
        };
        let data = TemplateData::new()
            .with("id", ctx.id_prefix)
            .with("title", escape(&self.title))
            .with("busy", if loading { "true" } else { "false" })
            .with("loading", loading)
            .with("has_categories", !categories.is_empty())
            .with("categories", Value::List(categories))
            .with("has_items", !items.is_empty())
            .with("empty", !loading && items.is_empty() && self.phase == ListPhase::Ready)
            .with("empty_text", empty_text)
            .with("items", Value::List(items));
        Ok(TEMPLATE.render(&data))
    }

    fn on_key(&mut self, ctx: &EventContext<'_>, key: &KeyEvent) -> Reaction {
        if key.code.is_activation() {
            self.activate(ctx)
        } else {
            Reaction::ignored()
        }
    }

    fn on_pointer(&mut self, ctx: &EventContext<'_>, pointer: &PointerEvent) -> Reaction {
        if pointer.is_activation() {
            self.activate(ctx)
        } else {
            Reaction::ignored()
        }
    }
}

/// Validate `items`, show the loading state, and land them after the
/// list's `delay-ms` (or the runtime's load delay).
pub fn load(runtime: &Runtime, handle: &Handle<ReactiveList>, items: Vec<ListItem>) -> Result<(), LoadError> {
    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|source| LoadError::Item { index, source })?;
    }
    let delay = runtime
        .inspect(handle, |list| list.delay_ms)?
        .unwrap_or(runtime.config().load_delay_ms);
    let mut request = 0;
    runtime.update(handle, |list, _| {
        request = list.begin_load();
        Reaction::rerender()
    })?;
    tracing::debug!(message = "list.load_scheduled", unit = %handle.unit(), request, delay_ms = delay);
    runtime.schedule(handle, LOAD_TIMER, delay, move |list, _| {
        if list.finish_load(request, items) {
            Reaction::rerender()
        } else {
            Reaction::handled()
        }
    })?;
    Ok(())
}

/// [`load`] from a JSON array of `{title, category, variants?}` objects.
pub fn load_json(runtime: &Runtime, handle: &Handle<ReactiveList>, json: &str) -> Result<(), LoadError> {
    let items: Vec<ListItem> = serde_json::from_str(json)?;
    load(runtime, handle, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leanview_core::{Document, KeyCode, LeanLevel, NodeId};
    use leanview_runtime::{Lifecycle, RuntimeConfig, event_names, record_events};
    use pretty_assertions::assert_eq;

    #[test]
    fn template_is_well_formed() {
        assert!(TEMPLATE.is_well_formed(), "{:?}", TEMPLATE.diagnostics());
    }

    fn mount(attrs: &str) -> (Runtime, NodeId, Handle<ReactiveList>) {
        let rt = Runtime::new(
            Document::from_html(&format!("<lean-list id=l {attrs}></lean-list>")),
            RuntimeConfig::default().load_delay_ms(200),
        );
        let host = rt.document().find_by_id("l").expect("host");
        let handle = rt.attach(host, ReactiveList::default()).expect("attach");
        (rt, host, handle)
    }

    fn sample() -> Vec<ListItem> {
        vec![
            ListItem::new("Rates hold", "economy").with_variants("0:Rates hold|2:Rates finally hold"),
            ListItem::new("Storm nears", "weather"),
            ListItem::new("Jobs <up>", "economy"),
        ]
    }

    fn item_texts(rt: &Runtime, host: NodeId) -> Vec<String> {
        let doc = rt.document();
        doc.query_all(host, |el| el.tag() == "li")
            .into_iter()
            .map(|li| doc.text_content(li))
            .collect()
    }

    #[test]
    fn load_shows_loading_then_items() {
        let (rt, host, handle) = mount(r#"title="Latest""#);
        load(&rt, &handle, sample()).expect("load");
        assert_eq!(rt.inspect(&handle, ReactiveList::phase).expect("phase"), ListPhase::Loading { request: 1 });
        assert!(rt.document().inner_html(host).contains(r#"aria-busy="true""#));
        assert!(item_texts(&rt, host).is_empty());

        rt.advance_time(199);
        assert!(item_texts(&rt, host).is_empty());
        rt.advance_time(1);
        assert_eq!(item_texts(&rt, host), vec!["Rates hold", "Storm nears", "Jobs <up>"]);
        assert!(rt.document().inner_html(host).contains(r#"aria-busy="false""#));
    }

    #[test]
    fn loaded_items_render_nested_blocks() {
        let (rt, host, handle) = mount("");
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(200);
        let html = rt.document().inner_html(host);
        assert!(!html.contains("{{"), "unrendered marker in {html}");
        assert!(html.contains(r#"<li data-item-category="economy"><span data-variants="0:Rates hold|2:Rates finally hold""#));
        assert!(html.contains(r#"<li data-item-category="weather">Storm nears</li>"#));
        assert!(!html.contains("lean-loading"));
    }

    #[test]
    fn second_load_replaces_pending_one() {
        let (rt, host, handle) = mount("");
        load(&rt, &handle, sample()).expect("first");
        rt.advance_time(150);
        load(&rt, &handle, vec![ListItem::new("Only", "misc")]).expect("second");
        assert_eq!(rt.scheduler().pending(), 1);
        rt.advance_time(100);
        assert!(item_texts(&rt, host).is_empty(), "first request never lands");
        rt.advance_time(100);
        assert_eq!(item_texts(&rt, host), vec!["Only"]);
    }

    #[test]
    fn delay_attribute_overrides_config() {
        let (rt, host, handle) = mount(r#"delay-ms="50""#);
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(50);
        assert_eq!(item_texts(&rt, host).len(), 3);
    }

    #[test]
    fn detach_during_load_leaves_dom_untouched() {
        let (rt, host, handle) = mount("");
        load(&rt, &handle, sample()).expect("load");
        rt.detach(handle.unit()).expect("detach");
        let before = rt.document().inner_html(host);
        assert_eq!(rt.advance_time(1_000), 0);
        assert_eq!(rt.document().inner_html(host), before);
        assert_eq!(rt.lifecycle(handle.unit()), Lifecycle::Detached);
    }

    #[test]
    fn category_buttons_toggle_filter_and_emit() {
        let (rt, host, handle) = mount("");
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(200);
        let log = record_events(&rt, rt.root());

        let economy = rt
            .document()
            .query_all(host, |el| el.attr(CATEGORY_ATTR) == Some("economy"))[0];
        assert!(rt.click(economy));
        assert_eq!(item_texts(&rt, host), vec!["Rates hold", "Jobs <up>"]);

        let economy = rt
            .document()
            .query_all(host, |el| el.attr(CATEGORY_ATTR) == Some("economy"))[0];
        assert_eq!(rt.document().attr(economy, "aria-pressed"), Some("true"));
        assert!(rt.key(economy, KeyEvent::new(KeyCode::Enter)));
        assert_eq!(item_texts(&rt, host).len(), 3);

        let details: Vec<HostEventDetail> = log.borrow().iter().map(|e| e.detail.clone()).collect();
        assert_eq!(
            details,
            vec![
                HostEventDetail::CategoryFilter {
                    category: Some("economy".into())
                },
                HostEventDetail::CategoryFilter { category: None },
            ]
        );
        assert_eq!(event_names(&log).len(), 2);
    }

    #[test]
    fn initial_category_attribute_filters() {
        let (rt, host, handle) = mount(r#"category="weather""#);
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(200);
        assert_eq!(item_texts(&rt, host), vec!["Storm nears"]);
    }

    #[test]
    fn item_variants_follow_level() {
        let (rt, host, handle) = mount("");
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(200);
        rt.set_state(StatePatch::new().lean_level(LeanLevel::MAX));
        assert_eq!(item_texts(&rt, host)[0], "Rates finally hold");
    }

    #[test]
    fn invalid_items_are_rejected_before_loading() {
        let (rt, _host, handle) = mount("");
        let err = load_json(&rt, &handle, r#"[{"title": "ok", "category": "a"}, {"title": " ", "category": "b"}]"#)
            .expect_err("blank title");
        assert!(matches!(err, LoadError::Item { index: 1, .. }), "{err}");
        assert_eq!(rt.inspect(&handle, ReactiveList::phase).expect("phase"), ListPhase::Idle);
        assert_eq!(rt.scheduler().pending(), 0);

        let err = load_json(&rt, &handle, r#"{"title": "not a list"}"#).expect_err("shape");
        assert!(matches!(err, LoadError::Json(_)));
        let err = load_json(&rt, &handle, r#"[{"title": "t", "category": "c", "variants": "9:nope"}]"#)
            .expect_err("variants");
        assert!(err.to_string().contains("variants"), "{err}");
    }

    #[test]
    fn empty_result_says_so() {
        let (rt, host, handle) = mount(r#"category="sports""#);
        load(&rt, &handle, sample()).expect("load");
        rt.advance_time(200);
        assert!(rt.document().inner_html(host).contains("No items in sports"));
    }
}
