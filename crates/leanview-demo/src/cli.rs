#![forbid(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use leanview::prelude::*;
use leanview_core::HostEvent;
use leanview_runtime::{FileStorage, MemoryStorage, StorageBackend, record_events};
use leanview_widgets::{ReactiveList, load_json};
use serde::Serialize;

use crate::error::{DemoError, Result};
use crate::logging::{self, LogFormat, Verbosity};
use crate::page::{DEFAULT_ITEMS, DEFAULT_PAGE};

#[derive(Debug, Parser)]
#[command(
    name = "leanview-demo",
    about = "Upgrade a lean-aware page headlessly, replay input, and print the result",
    version
)]
pub struct Cli {
    /// Server-rendered page markup (built-in page when omitted).
    #[arg(long)]
    pub page: Option<PathBuf>,

    /// JSON array of list items loaded into every `lean-list`.
    #[arg(long)]
    pub items: Option<PathBuf>,

    /// Comma-separated DOM key names sent to the focused element, e.g. `ArrowRight,End`.
    #[arg(long, default_value = "")]
    pub keys: String,

    /// Set the lean level (-2..2) before replaying keys.
    #[arg(long, allow_hyphen_values = true)]
    pub level: Option<i64>,

    /// Set the topic before replaying keys.
    #[arg(long)]
    pub topic: Option<String>,

    /// Virtual milliseconds to advance after the key script.
    #[arg(long, default_value_t = 1_000)]
    pub advance_ms: u64,

    /// Simulated list latency; overrides `LEANVIEW_LOAD_DELAY_MS`.
    #[arg(long)]
    pub load_delay_ms: Option<u64>,

    /// Preview length for content activation; overrides `LEANVIEW_PREVIEW_CHARS`.
    #[arg(long)]
    pub preview_chars: Option<usize>,

    /// JSON preference file for the theme (in-memory when omitted).
    #[arg(long)]
    pub prefs: Option<PathBuf>,

    /// Flip the persisted theme once.
    #[arg(long)]
    pub toggle_theme: bool,

    /// Print a single JSON report instead of markup plus event lines.
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Environment config with flags applied on top.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::from_env();
        if let Some(ms) = self.load_delay_ms {
            config = config.load_delay_ms(ms);
        }
        if let Some(chars) = self.preview_chars {
            config = config.preview_chars(chars);
        }
        config
    }
}

#[derive(Debug, Serialize)]
struct Report {
    theme: String,
    state: leanview_runtime::AppState,
    units: usize,
    html: String,
    events: Vec<HostEvent>,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, Verbosity::from_flags(cli.verbose, cli.quiet));
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| DemoError::Read {
        path: path.to_owned(),
        source,
    })
}

fn parse_keys(script: &str) -> Result<Vec<KeyEvent>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|key| {
            let name = if key.eq_ignore_ascii_case("space") { " " } else { key };
            KeyEvent::from_dom_key(name).ok_or_else(|| DemoError::UnknownKey { key: key.to_owned() })
        })
        .collect()
}

pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    if let Some(level) = cli.level
        && !(-2..=2).contains(&level)
    {
        tracing::debug!(message = "demo.level_clamped", level);
    }
    let keys = parse_keys(&cli.keys)?;
    let markup = match &cli.page {
        Some(path) => read(path)?,
        None => DEFAULT_PAGE.to_owned(),
    };
    let items = match &cli.items {
        Some(path) => read(path)?,
        None => DEFAULT_ITEMS.to_owned(),
    };
    let storage: Box<dyn StorageBackend> = match &cli.prefs {
        Some(path) => Box::new(FileStorage::new(path)),
        None => Box::new(MemoryStorage::new()),
    };

    let runtime = Runtime::with_storage(Document::from_html(&markup), cli.runtime_config(), storage);
    define_all(&runtime);
    let root = runtime.document().root();
    let log = record_events(&runtime, root);
    let units = runtime.upgrade(root);
    tracing::info!(message = "demo.upgraded", units = units.len());

    let lists: Vec<NodeId> = runtime
        .document()
        .query_all(root, |el| el.tag() == "lean-list");
    for host in lists {
        if let Some(handle) = runtime.handle_at::<ReactiveList>(host) {
            load_json(&runtime, &handle, &items)?;
        }
    }

    let mut patch = StatePatch::new();
    if let Some(level) = cli.level {
        patch = patch.lean_level(LeanLevel::new(level));
    }
    if let Some(topic) = &cli.topic {
        patch = patch.topic(topic.as_str());
    }
    if !patch.is_empty() {
        runtime.set_state(patch);
    }
    if cli.toggle_theme {
        runtime.toggle_theme();
    }

    focus_selector(&runtime);
    for key in keys {
        let handled = runtime.press(key);
        tracing::debug!(message = "demo.key", key = ?key.code, handled);
    }
    let fired = runtime.advance_time(cli.advance_ms);
    tracing::debug!(message = "demo.advanced", ms = cli.advance_ms, timers = fired);

    let html = runtime.document().outer_html(root);
    let events = log.borrow().clone();
    if cli.json {
        let report = Report {
            theme: runtime.theme().to_string(),
            state: (*runtime.state()).clone(),
            units: runtime.units().len(),
            html,
            events,
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{html}")?;
        for event in &events {
            writeln!(out, "{}", event.to_json())?;
        }
    }
    runtime.teardown();
    Ok(())
}

/// Put focus on the first selector's checked position so key scripts drive it.
fn focus_selector(runtime: &Runtime) {
    runtime.with_document(|doc| {
        let root = doc.root();
        let checked = doc
            .query_all(root, |el| el.attr("role") == Some("radio") && el.attr("aria-checked") == Some("true"))
            .first()
            .copied();
        if let Some(button) = checked {
            doc.focus(button);
        }
    });
}
