// src/telemetry.rs
//! Logging and metrics setup. `init` is the only place that touches global
//! subscriber state.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

pub const ARTICLES_COLLECTED: &str = "collector_articles_total";
pub const SOURCE_ERRORS: &str = "collector_source_errors_total";
pub const STORE_INSERTED: &str = "store_inserted_total";
pub const STORE_FAILED: &str = "store_failed_total";
pub const STORE_DUPLICATES: &str = "store_duplicates_total";
pub const CYCLE_MS: &str = "watchdog_cycle_ms";
pub const LAST_CYCLE_TS: &str = "watchdog_last_cycle_ts";

/// One-time metrics registration (so series show up once a recorder exists).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(ARTICLES_COLLECTED, "Articles produced by collectors.");
        describe_counter!(
            SOURCE_ERRORS,
            "Sub-source (subreddit/feed) fetch or parse errors."
        );
        describe_counter!(STORE_INSERTED, "Articles appended to the remote table.");
        describe_counter!(STORE_FAILED, "Article inserts rejected or failed.");
        describe_counter!(STORE_DUPLICATES, "Articles dropped as duplicates.");
        describe_histogram!(CYCLE_MS, "Collection cycle duration in milliseconds.");
        describe_gauge!(LAST_CYCLE_TS, "Unix ts when the last cycle finished.");
    });
}

/// Install the tracing subscriber: stderr layer (compact or JSON) plus an
/// optional append-mode file layer. `RUST_LOG` overrides `cfg.level`.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init(cfg: &LoggingConfig) -> Result<bool> {
    static INSTALLED: OnceCell<()> = OnceCell::new();
    if INSTALLED.get().is_some() {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = if cfg.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().compact().with_writer(std::io::stderr).boxed()
    };

    let file_layer = match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    let _ = INSTALLED.set(());
    ensure_metrics_described();
    Ok(installed)
}
