#![forbid(unsafe_code)]

use std::path::PathBuf;

use leanview_runtime::RuntimeError;
use leanview_widgets::LoadError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("list data rejected: {0}")]
    Load(#[from] LoadError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("unknown key in script: {key:?}")]
    UnknownKey { key: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownKey { .. } | Self::InvalidArgument { .. } => 2,
            Self::Read { .. } | Self::Io(_) => 3,
            Self::Json(_) | Self::Load(_) => 4,
            Self::Runtime(_) => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
