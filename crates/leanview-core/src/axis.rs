#![forbid(unsafe_code)]

//! Lean axes: the label vocabulary attached to the five levels.
//!
//! An axis never changes which level is active. It only answers "what is this
//! level called on this axis", so the selector, state display and content
//! blocks can label the same [`LeanLevel`] differently per article type.

use serde::{Deserialize, Serialize};

use crate::level::LeanLevel;

/// Name, description and icon for one level of an axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl LevelInfo {
    fn new(name: &str, description: &str, icon: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            icon: Some(icon.to_owned()),
        }
    }
}

/// A named axis with exactly one [`LevelInfo`] per level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanAxis {
    /// Internal name, e.g. `liberal-conservative`.
    pub name: String,
    /// Display label, e.g. `Political Perspective`.
    pub label: String,
    pub icon: String,
    /// Indexed by [`LeanLevel::index`].
    pub levels: [LevelInfo; 5],
}

impl LeanAxis {
    /// Axis used when a unit declares none.
    pub const DEFAULT_NAME: &'static str = "liberal-conservative";

    #[must_use]
    pub fn political() -> Self {
        Self {
            name: "liberal-conservative".into(),
            label: "Political Perspective".into(),
            icon: "🏛️".into(),
            levels: [
                LevelInfo::new("Progressive", "Strong government role, social change", "🌊"),
                LevelInfo::new("Liberal", "Government solutions, regulated markets", "🔵"),
                LevelInfo::new("Centrist", "Balanced approach, pragmatic solutions", "⚖️"),
                LevelInfo::new("Conservative", "Traditional values, limited government", "🔴"),
                LevelInfo::new("Libertarian", "Minimal government, maximum freedom", "🗽"),
            ],
        }
    }

    #[must_use]
    pub fn experience() -> Self {
        Self {
            name: "junior-senior".into(),
            label: "Experience Level".into(),
            icon: "💼".into(),
            levels: [
                LevelInfo::new("Intern", "New to field, needs fundamentals", "🎓"),
                LevelInfo::new("Junior", "Basic understanding, learning", "👨‍💻"),
                LevelInfo::new("Professional", "Solid foundation, practical focus", "💼"),
                LevelInfo::new("Senior", "Deep expertise, strategic thinking", "🎯"),
                LevelInfo::new("Executive", "Leadership perspective, big picture", "👔"),
            ],
        }
    }

    #[must_use]
    pub fn complexity() -> Self {
        Self {
            name: "basic-expert".into(),
            label: "Complexity Level".into(),
            icon: "🎯".into(),
            levels: [
                LevelInfo::new("Basic", "Simple explanations, fundamental concepts", "📚"),
                LevelInfo::new("Intermediate", "Some background assumed, practical focus", "📖"),
                LevelInfo::new("Advanced", "Professional level, technical depth", "🔬"),
                LevelInfo::new("Expert", "Specialized knowledge, detailed analysis", "🎓"),
                LevelInfo::new("Master", "Cutting-edge insight, research depth", "🧠"),
            ],
        }
    }

    /// All built-in axes.
    #[must_use]
    pub fn builtin() -> [Self; 3] {
        [Self::political(), Self::experience(), Self::complexity()]
    }

    /// Look up a built-in axis by internal name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Self::builtin().into_iter().find(|axis| axis.name == name.trim())
    }

    /// Built-in axis by name, or the political axis when unknown.
    #[must_use]
    pub fn by_name_or_default(name: Option<&str>) -> Self {
        match name.and_then(Self::by_name) {
            Some(axis) => axis,
            None => {
                if let Some(unknown) = name {
                    tracing::debug!(message = "axis.unknown", axis = unknown);
                }
                Self::political()
            }
        }
    }

    #[must_use]
    pub fn info(&self, level: LeanLevel) -> &LevelInfo {
        &self.levels[level.index()]
    }

    /// Level name on this axis, e.g. `Centrist`.
    #[must_use]
    pub fn level_name(&self, level: LeanLevel) -> &str {
        &self.info(level).name
    }
}

impl Default for LeanAxis {
    fn default() -> Self {
        Self::political()
    }
}
