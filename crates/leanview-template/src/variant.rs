#![forbid(unsafe_code)]

//! Lean-variant text resolution.
//!
//! A variant map is carried inline on an element as a flat encoding:
//!
//! ```text
//! data-variants="0:Markets steady|2:Markets roar|-2:Markets wobble"
//! ```
//!
//! Pairs are separated by `|` and split on the first `:`, so text may
//! contain colons. Keys accept an optional sign and surrounding whitespace;
//! texts are kept verbatim, edge spaces included.
//!
//! # Invariants
//!
//! 1. Resolution returns the exact entry when present, else the level-0
//!    entry, else the first entry in encoding order.
//! 2. Keys outside `-2..=2`, unparsable keys and blank texts are dropped;
//!    for duplicate keys the first pair wins.
//! 3. [`apply_variants`] sets text and swaps the state class of each element
//!    in a single tree mutation, so no observer sees one without the other.

use leanview_core::LeanLevel;
use leanview_core::dom::{Document, NodeId};

/// Attribute that carries a variant encoding.
pub const VARIANTS_ATTR: &str = "data-variants";
/// Attribute recording the level last applied to a variant element.
pub const ACTIVE_LEVEL_ATTR: &str = "data-active-level";

/// How a resolved text was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Exact,
    NeutralFallback,
    FirstEntry,
    Empty,
}

/// Parsed variant map in encoding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantMap {
    entries: Vec<(LeanLevel, String)>,
}

impl VariantMap {
    /// Parse a flat `level:text|level:text` encoding. Never fails.
    #[must_use]
    pub fn parse(encoded: &str) -> Self {
        let mut entries: Vec<(LeanLevel, String)> = Vec::new();
        for pair in encoded.split('|') {
            let Some((key, text)) = pair.split_once(':') else {
                if !pair.trim().is_empty() {
                    tracing::debug!(message = "variant.pair_dropped", pair, reason = "no separator");
                }
                continue;
            };
            let key = key.trim();
            let key = key.strip_prefix('+').unwrap_or(key);
            let level = match key.parse::<i64>() {
                Ok(n @ -2..=2) => LeanLevel::new(n),
                _ => {
                    tracing::debug!(message = "variant.pair_dropped", pair, reason = "bad level");
                    continue;
                }
            };
            if text.trim().is_empty() || entries.iter().any(|(l, _)| *l == level) {
                continue;
            }
            entries.push((level, text.to_owned()));
        }
        Self { entries }
    }

    /// Build from explicit pairs, keeping the first text per level.
    pub fn from_entries<S: Into<String>>(pairs: impl IntoIterator<Item = (LeanLevel, S)>) -> Self {
        let mut entries: Vec<(LeanLevel, String)> = Vec::new();
        for (level, text) in pairs {
            if !entries.iter().any(|(l, _)| *l == level) {
                entries.push((level, text.into()));
            }
        }
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, level: LeanLevel) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, text)| text.as_str())
    }

    #[must_use]
    pub fn has_neutral(&self) -> bool {
        self.get(LeanLevel::NEUTRAL).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeanLevel, &str)> {
        self.entries.iter().map(|(l, t)| (*l, t.as_str()))
    }

    /// Text for `level` and how it was chosen.
    #[must_use]
    pub fn resolve_with_source(&self, level: LeanLevel) -> (&str, Resolution) {
        if let Some(text) = self.get(level) {
            return (text, Resolution::Exact);
        }
        if let Some(text) = self.get(LeanLevel::NEUTRAL) {
            tracing::debug!(message = "variant.fallback", level = %level, to = "neutral");
            return (text, Resolution::NeutralFallback);
        }
        match self.entries.first() {
            Some((first, text)) => {
                tracing::debug!(message = "variant.fallback", level = %level, to = %first);
                (text.as_str(), Resolution::FirstEntry)
            }
            None => ("", Resolution::Empty),
        }
    }

    #[must_use]
    pub fn resolve(&self, level: LeanLevel) -> &str {
        self.resolve_with_source(level).0
    }

    /// Back to the flat encoding, in entry order.
    #[must_use]
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(level, text)| format!("{level}:{text}"))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Resolve a flat encoding for `level`.
#[must_use]
pub fn resolve(encoded: &str, level: LeanLevel) -> String {
    VariantMap::parse(encoded).resolve(level).to_owned()
}

/// Rewrite every `data-variants` element under `root` (inclusive) for `level`.
///
/// Each element gets the resolved text as its only child, the level's state
/// class in place of any other level class, and `data-active-level`.
/// Elements whose encoding holds no usable pair are left untouched.
/// Returns the number of elements rewritten.
pub fn apply_variants(doc: &mut Document, root: NodeId, level: LeanLevel) -> usize {
    let mut applied = 0;
    for node in doc.elements_with_attr(root, VARIANTS_ATTR) {
        let map = VariantMap::parse(doc.attr(node, VARIANTS_ATTR).unwrap_or_default());
        if map.is_empty() {
            tracing::debug!(message = "variant.empty_map", node = %node);
            continue;
        }
        let text = map.resolve(level).to_owned();
        let written = doc
            .set_text_content(node, &text)
            .and_then(|()| doc.swap_classes(node, &LeanLevel::STATE_CLASSES, level.state_class()))
            .and_then(|()| doc.set_attr(node, ACTIVE_LEVEL_ATTR, &level.to_string()));
        match written {
            Ok(()) => applied += 1,
            Err(err) => tracing::warn!(message = "variant.apply_failed", error = %err),
        }
    }
    tracing::trace!(message = "variant.applied", level = %level, count = applied);
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn level(n: i64) -> LeanLevel {
        LeanLevel::new(n)
    }

    #[test]
    fn exact_then_neutral_then_first() {
        let map = VariantMap::parse("0:steady|2:roaring|-1:cautious");
        assert_eq!(map.resolve_with_source(level(2)), ("roaring", Resolution::Exact));
        assert_eq!(map.resolve_with_source(level(1)), ("steady", Resolution::NeutralFallback));

        let no_neutral = VariantMap::parse("1:right|-1:left");
        assert_eq!(no_neutral.resolve_with_source(level(2)), ("right", Resolution::FirstEntry));

        assert_eq!(VariantMap::parse("").resolve_with_source(level(0)), ("", Resolution::Empty));
    }

    #[test]
    fn lenient_parsing() {
        let map = VariantMap::parse(" +1 :a: b| 0:n|5:far|x:bad|nocolon|-2: |0:dup");
        assert_eq!(
            map.iter().collect::<Vec<_>>(),
            vec![(level(1), "a: b"), (level(0), "n")]
        );
        assert_eq!(map.encode(), "1:a: b|0:n");
    }

    #[test]
    fn text_edge_spaces_survive() {
        let map = VariantMap::parse("0: rises |2: soars ");
        assert_eq!(map.resolve(level(2)), " soars ");
        assert_eq!(map.resolve(level(1)), " rises ");
        assert_eq!(format!("Prices{}today", map.resolve(level(0))), "Prices rises today");
        assert_eq!(map.encode(), "0: rises |2: soars ");
    }

    #[test]
    fn free_resolve_matches_map() {
        assert_eq!(resolve("0:base|-2:far left", level(-2)), "far left");
        assert_eq!(resolve("0:base|-2:far left", level(-1)), "base");
    }

    #[test]
    fn from_entries_keeps_first() {
        let map = VariantMap::from_entries([(level(0), "a"), (level(0), "b"), (level(1), "c")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(level(0)), "a");
        assert!(map.has_neutral());
    }

    #[test]
    fn apply_sets_text_class_and_marker_together() {
        let mut doc = Document::from_html(
            r#"<section id=s><span id=v class="lede lean-neutral" data-variants="0:Flat|2:Up">Flat</span><span id=e data-variants="junk">keep</span></section>"#,
        );
        let section = doc.find_by_id("s").expect("section");
        assert_eq!(apply_variants(&mut doc, section, level(2)), 1);

        let span = doc.find_by_id("v").expect("span");
        assert_eq!(doc.text_content(span), "Up");
        assert_eq!(doc.class_list(span), vec!["lede", "lean-strong-right"]);
        assert_eq!(doc.attr(span, ACTIVE_LEVEL_ATTR), Some("2"));

        let untouched = doc.find_by_id("e").expect("span");
        assert_eq!(doc.text_content(untouched), "keep");
    }

    #[test]
    fn apply_is_repeatable() {
        let mut doc = Document::from_html(r#"<p data-variants="0:a|-1:b"></p>"#);
        let root = doc.root();
        apply_variants(&mut doc, root, level(-1));
        let once = doc.inner_html(root);
        apply_variants(&mut doc, root, level(-1));
        assert_eq!(doc.inner_html(root), once);
        apply_variants(&mut doc, root, level(0));
        assert_eq!(
            doc.inner_html(root),
            r#"<p data-variants="0:a|-1:b" class="lean-neutral" data-active-level="0">a</p>"#
        );
    }
}
