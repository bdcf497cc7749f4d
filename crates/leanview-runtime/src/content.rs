#![forbid(unsafe_code)]

//! Externally generated content payloads.
//!
//! Payload markup arrives pre-rendered and trusted. It carries three kinds
//! of marker:
//!
//! - block wrappers (`data-lean-block` or `<article-content>`) with level and
//!   axis metadata;
//! - inline spans with a `data-variants` encoding, handled by
//!   [`leanview_template::apply_variants`];
//! - a `data-sources` list of attribution anchors.
//!
//! This module makes wrappers keyboard and pointer activatable and builds
//! the `content-activated` payload.

use leanview_core::dom::{Document, Element, NodeId, NodeKind, decode_entities};
use leanview_core::{HostEventDetail, LeanAxis, LeanLevel, Source};
use unicode_segmentation::UnicodeSegmentation;

pub const BLOCK_ATTR: &str = "data-lean-block";
pub const WRAPPER_TAG: &str = "article-content";
pub const SOURCES_ATTR: &str = "data-sources";
pub const ELLIPSIS: char = '…';

fn is_wrapper_element(el: &Element) -> bool {
    el.tag() == WRAPPER_TAG || el.attr(BLOCK_ATTR).is_some()
}

#[must_use]
pub fn is_wrapper(doc: &Document, node: NodeId) -> bool {
    doc.element(node).is_some_and(is_wrapper_element)
}

/// Nearest wrapper enclosing `node` (inclusive).
#[must_use]
pub fn wrapper_for(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.closest(node, is_wrapper_element)
}

/// Make every wrapper under `root` focusable and activatable.
///
/// Existing `tabindex`/`role` values are kept. Returns the wrapper count.
pub fn prepare(doc: &mut Document, root: NodeId) -> usize {
    let wrappers = doc.query_all(root, is_wrapper_element);
    for &wrapper in &wrappers {
        for (name, value) in [("tabindex", "0"), ("role", "button")] {
            if !doc.has_attr(wrapper, name)
                && let Err(err) = doc.set_attr(wrapper, name, value)
            {
                tracing::debug!(message = "content.prepare_failed", error = %err);
            }
        }
    }
    wrappers.len()
}

/// Wrapper level: `data-z-score`, then `data-level` (both `-2..=2`), then the
/// `data-lean-level` ordinal (`1..=5`). Neutral when none parse.
#[must_use]
pub fn level_of(doc: &Document, wrapper: NodeId) -> LeanLevel {
    ["data-z-score", "data-level"]
        .into_iter()
        .find_map(|name| doc.attr(wrapper, name).and_then(LeanLevel::parse))
        .or_else(|| {
            doc.attr(wrapper, "data-lean-level")
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .map(LeanLevel::from_ordinal)
        })
        .unwrap_or_default()
}

/// Wrapper axis name, or the default axis when unset.
#[must_use]
pub fn axis_of(doc: &Document, wrapper: NodeId) -> String {
    doc.attr(wrapper, "data-axis")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(LeanAxis::DEFAULT_NAME)
        .to_owned()
}

/// Attribution anchors inside `data-sources` lists.
#[must_use]
pub fn sources_of(doc: &Document, wrapper: NodeId) -> Vec<Source> {
    let mut sources = Vec::new();
    for list in doc.elements_with_attr(wrapper, SOURCES_ATTR) {
        for anchor in doc.query_all(list, |el| el.tag() == "a") {
            let Some(url) = doc.attr(anchor, "href").map(str::trim).filter(|u| !u.is_empty()) else {
                continue;
            };
            let name = collapse_whitespace(&doc.text_content(anchor));
            sources.push(Source {
                name: if name.is_empty() { url.to_owned() } else { name },
                url: url.to_owned(),
            });
        }
    }
    sources
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed wrapper text, without sources, cut to `max_graphemes`.
#[must_use]
pub fn preview_of(doc: &Document, wrapper: NodeId, max_graphemes: usize) -> String {
    let excluded = doc.elements_with_attr(wrapper, SOURCES_ATTR);
    let mut raw = String::new();
    for node in doc.descendants(wrapper) {
        if let Some(NodeKind::Text(text)) = doc.kind(node)
            && !excluded.iter().any(|&list| doc.contains(list, node))
        {
            raw.push_str(text);
        }
    }
    let text = collapse_whitespace(&decode_entities(&raw));
    truncate(&text, max_graphemes)
}

fn truncate(text: &str, max_graphemes: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max_graphemes) {
        None => text.to_owned(),
        Some((cut, _)) => {
            let mut out = text[..cut].trim_end().to_owned();
            out.push(ELLIPSIS);
            out
        }
    }
}

/// The `content-activated` payload for `wrapper`.
#[must_use]
pub fn activation(doc: &Document, wrapper: NodeId, preview_chars: usize) -> HostEventDetail {
    HostEventDetail::ContentActivated {
        axis: axis_of(doc, wrapper),
        level: level_of(doc, wrapper),
        preview: preview_of(doc, wrapper, preview_chars),
        sources: sources_of(doc, wrapper),
    }
}
