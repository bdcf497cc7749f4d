#![forbid(unsafe_code)]

//! Tracing subscriber setup for the demo binary.
//!
//! # Priority (highest to lowest)
//!
//! 1. `LEANVIEW_LOG` env var (directives, e.g. `leanview_runtime=debug,warn`)
//! 2. `RUST_LOG`
//! 3. CLI flags (`-v` → debug, `-q` → error)
//! 4. Default level: `warn`
//!
//! Logs go to stderr so stdout carries only the demo output.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(format: LogFormat, verbosity: Verbosity) {
    let filter = build_env_filter(verbosity, |name| std::env::var(name).ok());
    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).without_time().compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!(message = "logging.already_installed");
    }
}

fn build_env_filter(verbosity: Verbosity, lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    for var in ["LEANVIEW_LOG", "RUST_LOG"] {
        if let Some(directives) = lookup(var)
            && let Ok(filter) = EnvFilter::try_new(&directives)
        {
            return filter;
        }
    }
    let level = verbosity.default_level();
    let directive = if verbosity == Verbosity::Verbose {
        format!("{level},leanview=debug,leanview_runtime=debug,leanview_widgets=debug")
    } else {
        level.to_string()
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false).default_level(), Level::WARN);
    }

    #[test]
    fn project_variable_beats_rust_log() {
        let filter = build_env_filter(Verbosity::Normal, |name| match name {
            "LEANVIEW_LOG" => Some("leanview_runtime=trace".into()),
            "RUST_LOG" => Some("error".into()),
            _ => None,
        });
        assert_eq!(filter.to_string(), "leanview_runtime=trace");
    }

    #[test]
    fn unparsable_directives_fall_through() {
        let filter = build_env_filter(Verbosity::Quiet, |name| {
            (name == "LEANVIEW_LOG").then(|| "leanview=loud".to_owned())
        });
        assert_eq!(filter.to_string(), "error");
    }
}
