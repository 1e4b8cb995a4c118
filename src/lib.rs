//! MIL-STD-1553B bus capture analysis engine.
//!
//! Takes an already-parsed capture table and produces a data-only
//! diagnostic report: per-stream periodicity, jitter and deviations, plus
//! one aggregate health assessment. The pipeline runs in fixed stages:
//! - `schema`: resolve and check the table's columns (the only fatal step)
//! - `normalize`: parse timestamps, rebase to relative time, derive stream ids
//! - `aggregate`: group records by stream and compute interval series
//! - `analysis`: per-stream analyzers and the health scorer (gateway module)
//! - `report`: assemble the output and strip non-finite floats
//!
//! Everything is synchronous and in-memory; no state survives a call to
//! [`analyze_table`].

use tracing::info;

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod decoder;
pub mod error;
pub mod models;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod stats;

pub use config::{AnalysisConfig, AnalysisMode, Config};
pub use error::{DecodeError, EngineError, TimestampError};
pub use models::{Anomaly, AnomalyType, Cell, LogRecord, NormalizedRecord, RawTable, Severity};
pub use report::{AnalysisReport, BatchSummary, Sanitize};

use analysis::HealthReport;

// ---

/// Analyze one capture table.
///
/// Fails only when a column required by `mode` is missing. Malformed cells
/// never fail the batch: bad timestamps drop their row, bad words are
/// treated as absent.
pub fn analyze_table(
    table: &RawTable,
    mode: AnalysisMode,
    cfg: &AnalysisConfig,
) -> Result<AnalysisReport, EngineError> {
    // ---
    let layout = schema::resolve_columns(table, mode)?;
    let batch = normalize::normalize(table, &layout);
    let grouping = aggregate::group_streams(&batch.records, cfg.min_stream_len);

    let sections = analysis::analyze_streams(&grouping.streams, &layout.data_words, mode, cfg);
    let health = HealthReport::assess(
        &sections.periodicity,
        &sections.jitter,
        &sections.deviations,
        cfg,
    );

    let summary = BatchSummary {
        total_rows: batch.total_rows,
        dropped_rows: batch.dropped_rows,
        normalized_records: batch.records.len(),
        stream_count: grouping.stream_count,
        analyzed_streams: grouping.streams.len(),
        excluded_streams: grouping.excluded,
        capture_duration: batch.records.last().map_or(0.0, |r| r.relative_time),
    };

    info!(
        "Analyzed {} rows ({} dropped) into {} streams ({} excluded); health {:.0} {}",
        summary.total_rows,
        summary.dropped_rows,
        summary.analyzed_streams,
        summary.excluded_streams,
        health.score,
        health.status.label()
    );

    Ok(AnalysisReport {
        mode,
        summary,
        periodicity: sections.periodicity,
        jitter: sections.jitter,
        deviations: sections.deviations,
        intervals: sections.intervals,
        health,
    }
    .sanitized())
}
