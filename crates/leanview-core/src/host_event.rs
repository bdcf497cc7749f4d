#![forbid(unsafe_code)]

//! Outbound notifications for the host page.
//!
//! Units emit [`HostEvent`]s that bubble from their target node to the
//! document root, where analytics or navigation collaborators listen.

use serde::Serialize;

use crate::dom::NodeId;
use crate::level::LeanLevel;

/// Event name filter for listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostEventKind {
    LevelChange,
    TopicChange,
    CategoryFilter,
    ContentActivated,
}

impl HostEventKind {
    /// DOM-style event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LevelChange => "level-change",
            Self::TopicChange => "topic-change",
            Self::CategoryFilter => "category-filter",
            Self::ContentActivated => "content-activated",
        }
    }
}

/// One `(name, url)` attribution pair from a content payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
}

/// Event payload: the changed field(s) and new value(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEventDetail {
    LevelChange {
        previous: LeanLevel,
        level: LeanLevel,
    },
    TopicChange {
        previous: String,
        topic: String,
    },
    CategoryFilter {
        category: Option<String>,
    },
    ContentActivated {
        axis: String,
        level: LeanLevel,
        preview: String,
        sources: Vec<Source>,
    },
}

impl HostEventDetail {
    #[must_use]
    pub const fn kind(&self) -> HostEventKind {
        match self {
            Self::LevelChange { .. } => HostEventKind::LevelChange,
            Self::TopicChange { .. } => HostEventKind::TopicChange,
            Self::CategoryFilter { .. } => HostEventKind::CategoryFilter,
            Self::ContentActivated { .. } => HostEventKind::ContentActivated,
        }
    }
}

/// A dispatched notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEvent {
    #[serde(skip)]
    pub target: NodeId,
    #[serde(flatten)]
    pub detail: HostEventDetail,
}

impl HostEvent {
    #[must_use]
    pub fn new(target: NodeId, detail: HostEventDetail) -> Self {
        Self { target, detail }
    }

    #[must_use]
    pub const fn kind(&self) -> HostEventKind {
        self.detail.kind()
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// One-line JSON form for analytics sinks.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::warn!(message = "host_event.serialize_failed", error = %err);
            format!(r#"{{"type":"{}"}}"#, self.name())
        })
    }
}
