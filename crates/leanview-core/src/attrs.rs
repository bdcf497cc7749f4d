#![forbid(unsafe_code)]

//! Declared configuration attributes.
//!
//! Server-rendered hosts configure units through hyphenated attributes
//! (`brand-primary="#123456"`). [`Attributes`] normalizes them to field names
//! (`brand_primary`) once, at attach time.

use std::collections::BTreeMap;

use crate::level::LeanLevel;

/// Attribute name to field name: hyphens become underscores.
#[must_use]
pub fn field_name(attribute: &str) -> String {
    attribute.trim().to_ascii_lowercase().replace('-', "_")
}

/// Normalized attribute snapshot of a host element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    fields: BTreeMap<String, String>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(name, value)` pairs. The first occurrence of a field wins.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut fields = BTreeMap::new();
        for (name, value) in pairs {
            fields.entry(field_name(name)).or_insert_with(|| value.to_owned());
        }
        Self { fields }
    }

    /// Builder-style insert using an attribute or field name.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(field_name(name), value.into());
        self
    }

    /// Raw value by field name (`brand_primary`) or attribute name (`brand-primary`).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&field_name(name)).map(String::as_str)
    }

    /// Value with surrounding whitespace removed; empty values count as absent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&field_name(name))
    }

    /// Boolean attribute: present and not `"false"`/`"0"`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|v| !matches!(v.trim(), "false" | "0"))
    }

    /// Level attribute, clamped. Unparsable text yields `None`.
    #[must_use]
    pub fn level(&self, name: &str) -> Option<LeanLevel> {
        self.text(name).and_then(LeanLevel::parse)
    }

    /// Unsigned integer attribute.
    #[must_use]
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.text(name).and_then(|v| v.parse().ok())
    }

    /// Comma-separated list, trimmed, empties dropped.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_names_map_to_fields() {
        let attrs = Attributes::from_pairs([("brand-primary", "#112233"), ("lean-level", "2")]);
        assert_eq!(attrs.get("brand_primary"), Some("#112233"));
        assert_eq!(attrs.get("brand-primary"), Some("#112233"));
        assert_eq!(attrs.level("lean-level"), Some(LeanLevel::MAX));
    }

    #[test]
    fn first_duplicate_wins() {
        let attrs = Attributes::from_pairs([("topic", "A"), ("TOPIC", "B")]);
        assert_eq!(attrs.get("topic"), Some("A"));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn typed_accessors() {
        let attrs = Attributes::new()
            .with("tags", " a, ,b ,c")
            .with("featured", "")
            .with("hidden", "false")
            .with("delay-ms", "250")
            .with("lean-level", "nine");
        assert_eq!(attrs.list("tags"), vec!["a", "b", "c"]);
        assert!(attrs.flag("featured"));
        assert!(!attrs.flag("hidden"));
        assert!(!attrs.flag("missing"));
        assert_eq!(attrs.u64("delay_ms"), Some(250));
        assert_eq!(attrs.level("lean-level"), None);
        assert_eq!(attrs.text("featured"), None);
    }
}
