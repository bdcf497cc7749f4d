#![forbid(unsafe_code)]

//! Persisted user preferences.
//!
//! A [`StorageBackend`] is a string key-value store, the shape of browser
//! local storage. [`ThemePreference`] reads the theme once at startup and
//! writes it back on every toggle.
//!
//! # Failure Modes
//!
//! - **Missing entry or file**: the default theme (light) is used.
//! - **Corrupt file or unknown value**: logged at warn; the default theme is
//!   used and the next toggle overwrites the entry.
//! - **Write failure**: logged at warn; the in-memory theme still changes.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("preference file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("preference file {path} is not a JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key-value persistence.
pub trait StorageBackend {
    fn load(&self, key: &str) -> StorageResult<Option<String>>;
    fn store(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// Process-local storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// A JSON object file holding every key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl StorageBackend for FileStorage {
    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> StorageResult<()> {
        // A corrupt file is replaced rather than blocking the write.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_owned(), value.to_owned());
        let json = serde_json::to_string_pretty(&entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const CLASSES: [&'static str; 2] = ["theme-light", "theme-dark"];

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Class put on the document root.
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Light => Self::CLASSES[0],
            Self::Dark => Self::CLASSES[1],
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted theme choice.
pub struct ThemePreference {
    storage: Box<dyn StorageBackend>,
    key: String,
    current: Cell<Theme>,
}

impl fmt::Debug for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemePreference")
            .field("key", &self.key)
            .field("current", &self.current.get())
            .finish_non_exhaustive()
    }
}

impl ThemePreference {
    /// Read the stored theme, falling back to [`Theme::Light`].
    #[must_use]
    pub fn load(storage: Box<dyn StorageBackend>, key: impl Into<String>) -> Self {
        let key = key.into();
        let theme = match storage.load(&key) {
            Ok(Some(raw)) => Theme::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(message = "theme.unknown_value", key = %key, value = %raw);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(err) => {
                tracing::warn!(message = "theme.load_failed", key = %key, error = %err);
                Theme::default()
            }
        };
        tracing::debug!(message = "theme.loaded", theme = %theme);
        Self {
            storage,
            key,
            current: Cell::new(theme),
        }
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.current.get()
    }

    /// Set and persist.
    pub fn set(&self, theme: Theme) {
        self.current.set(theme);
        if let Err(err) = self.storage.store(&self.key, theme.as_str()) {
            tracing::warn!(message = "theme.store_failed", key = %self.key, error = %err);
        }
    }

    /// Flip between light and dark, persist, and return the new theme.
    pub fn toggle(&self) -> Theme {
        let next = self.theme().toggled();
        self.set(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn memory_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load("k").expect("load"), None);
        storage.store("k", "dark").expect("store");
        assert_eq!(storage.load("k").expect("load").as_deref(), Some("dark"));
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");

        let pref = ThemePreference::load(Box::new(FileStorage::new(&path)), "theme");
        assert_eq!(pref.theme(), Theme::Light);
        assert_eq!(pref.toggle(), Theme::Dark);

        let reloaded = ThemePreference::load(Box::new(FileStorage::new(&path)), "theme");
        assert_eq!(reloaded.theme(), Theme::Dark);
    }

    #[test]
    fn file_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("prefs.json"));
        storage.store("a", "1").expect("store");
        storage.store("b", "2").expect("store");
        assert_eq!(storage.load("a").expect("load").as_deref(), Some("1"));
    }

    #[test]
    #[traced_test]
    fn corrupt_file_falls_back_to_light() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").expect("write");

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.load("theme"), Err(StorageError::Corrupt { .. })));

        let pref = ThemePreference::load(Box::new(storage), "theme");
        assert_eq!(pref.theme(), Theme::Light);
        assert!(logs_contain("theme.load_failed"));

        pref.toggle();
        let reloaded = ThemePreference::load(Box::new(FileStorage::new(&path)), "theme");
        assert_eq!(reloaded.theme(), Theme::Dark);
    }

    #[test]
    fn unknown_value_falls_back() {
        let storage = MemoryStorage::new();
        storage.store("theme", "sepia").expect("store");
        let pref = ThemePreference::load(Box::new(storage), "theme");
        assert_eq!(pref.theme(), Theme::Light);
    }

    #[test]
    fn theme_classes() {
        assert_eq!(Theme::Dark.class(), "theme-dark");
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(serde_json::to_string(&Theme::Dark).expect("json"), r#""dark""#);
    }
}
