#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Defaults are overridable per field with builder methods, and from the
//! environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LEANVIEW_LOAD_DELAY_MS` | [`RuntimeConfig::load_delay_ms`] |
//! | `LEANVIEW_PREVIEW_CHARS` | [`RuntimeConfig::preview_chars`] |
//! | `LEANVIEW_THEME_KEY` | [`RuntimeConfig::theme_key`] |
//! | `LEANVIEW_DEFAULT_TOPIC` | [`RuntimeConfig::default_topic`] |
//!
//! Unparsable values are logged and ignored.

use std::str::FromStr;

/// Default simulated latency before a list populates.
pub const DEFAULT_LOAD_DELAY_MS: u64 = 500;
/// Default content preview length in graphemes.
pub const DEFAULT_PREVIEW_CHARS: usize = 100;
/// Default storage key for the theme preference.
pub const DEFAULT_THEME_KEY: &str = "leanview-theme";
/// Default topic seeded into a fresh store.
pub const DEFAULT_TOPIC: &str = "Dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Delay applied by units that simulate data loading.
    pub load_delay_ms: u64,
    /// Maximum graphemes in a `content-activated` preview.
    pub preview_chars: usize,
    /// Storage key of the persisted theme.
    pub theme_key: String,
    /// Topic of the initial application state.
    pub default_topic: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            load_delay_ms: DEFAULT_LOAD_DELAY_MS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            theme_key: DEFAULT_THEME_KEY.to_owned(),
            default_topic: DEFAULT_TOPIC.to_owned(),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn load_delay_ms(mut self, ms: u64) -> Self {
        self.load_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    #[must_use]
    pub fn theme_key(mut self, key: impl Into<String>) -> Self {
        self.theme_key = key.into();
        self
    }

    #[must_use]
    pub fn default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = topic.into();
        self
    }

    /// Defaults overridden by `LEANVIEW_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ms) = parsed(&lookup, "LEANVIEW_LOAD_DELAY_MS") {
            config.load_delay_ms = ms;
        }
        if let Some(chars) = parsed(&lookup, "LEANVIEW_PREVIEW_CHARS") {
            config.preview_chars = chars;
        }
        if let Some(key) = non_empty(&lookup, "LEANVIEW_THEME_KEY") {
            config.theme_key = key;
        }
        if let Some(topic) = non_empty(&lookup, "LEANVIEW_DEFAULT_TOPIC") {
            config.default_topic = topic;
        }
        config
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = non_empty(lookup, name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(message = "config.invalid_env", variable = name, value = %raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.load_delay_ms, 500);
        assert_eq!(config.default_topic, "Dashboard");
        assert_eq!(RuntimeConfig::from_env_with(|_| None), config);
    }

    #[test]
    fn env_overrides_each_field() {
        let config = RuntimeConfig::from_env_with(env(&[
            ("LEANVIEW_LOAD_DELAY_MS", "25"),
            ("LEANVIEW_PREVIEW_CHARS", " 40 "),
            ("LEANVIEW_THEME_KEY", "prefs.theme"),
            ("LEANVIEW_DEFAULT_TOPIC", "Markets"),
        ]));
        assert_eq!(
            config,
            RuntimeConfig::default()
                .load_delay_ms(25)
                .preview_chars(40)
                .theme_key("prefs.theme")
                .default_topic("Markets")
        );
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = RuntimeConfig::from_env_with(env(&[
            ("LEANVIEW_LOAD_DELAY_MS", "soon"),
            ("LEANVIEW_PREVIEW_CHARS", "-3"),
            ("LEANVIEW_DEFAULT_TOPIC", "   "),
        ]));
        assert_eq!(config, RuntimeConfig::default());
    }
}
