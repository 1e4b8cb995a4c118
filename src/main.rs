//! Command-line driver for the `milbus-diagnostics` analysis engine.
//!
//! This binary orchestrates one analysis run:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing (to stderr)
//! - Reading one capture file (CSV or `{columns, rows}` JSON)
//! - Running the engine and printing the JSON report on stdout
//!
//! # Usage
//! `milbus-diagnostics [CAPTURE_FILE]`
//!
//! # Environment Variables
//! - `BUS_LOG_FILE` (optional) – capture file when no argument is given
//! - `BUS_ANALYSIS_MODE` (optional) – `full` or `timing` (default: `full`)
//! - `BUS_PRETTY_JSON` (optional) – pretty-print the report (default: `true`)
//! - `BUS_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `BUS_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! All analysis lives in the library; this file only wires configuration,
//! ingestion and output together.
use std::{env, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use milbus_diagnostics::{analyze_table, config};

mod ingest;

// ---

fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let path = env::args()
        .nth(1)
        .or_else(|| cfg.input_path.clone())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("No capture file given (pass a path or set BUS_LOG_FILE)"))?;

    tracing::info!("Analyzing capture: {}", path.display());
    let table = ingest::load_table(&path)?;

    let report = analyze_table(&table, cfg.mode, &cfg.analysis)
        .with_context(|| format!("Analysis of {} failed", path.display()))?;

    let json = if cfg.pretty_json {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Output on stderr, keeping stdout for the report
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY on stderr
/// - Span event emission mode controlled by the `BUS_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `BUS_LOG_LEVEL` env var
///
/// Called once at startup, before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("BUS_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("BUS_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
