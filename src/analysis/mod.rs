//! Per-stream analyzers and the health scorer.
//!
//! This module is the gateway to the analyzers: `lib.rs` only calls
//! [`analyze_streams`] and [`HealthReport::assess`], never an individual
//! pass. Streams are independent of each other; their results are keyed by
//! stream id in `BTreeMap`s so output order does not depend on input order.

use std::collections::BTreeMap;

use tracing::debug;

use crate::aggregate::Stream;
use crate::config::{AnalysisConfig, AnalysisMode};

pub mod deviation;
pub mod health;
pub mod jitter;
pub mod periodicity;
pub mod words;

pub use deviation::DeviationStats;
pub use health::{HealthCounts, HealthReport, HealthStatus};
pub use jitter::{JitterLevel, JitterStats};
pub use periodicity::{PeriodicityStats, Regularity};

// ---

/// Per-stream sections of the report, keyed by stream id.
#[derive(Debug, Clone, Default)]
pub struct StreamSections {
    // ---
    pub periodicity: BTreeMap<String, PeriodicityStats>,
    pub jitter: BTreeMap<String, JitterStats>,
    pub deviations: BTreeMap<String, DeviationStats>,
    pub intervals: BTreeMap<String, Vec<f64>>,
}

/// Run periodicity, jitter and deviation analysis over every stream.
pub fn analyze_streams(
    streams: &[Stream<'_>],
    data_columns: &[String],
    mode: AnalysisMode,
    cfg: &AnalysisConfig,
) -> StreamSections {
    // ---
    let mut sections = StreamSections::default();

    for stream in streams {
        let n = stream.len();
        let p = periodicity::analyze(&stream.intervals, n, cfg);
        let j = jitter::analyze(&stream.intervals, n, cfg);
        let d = deviation::analyze(stream, data_columns, mode, cfg);

        debug!(
            "Stream {}: {} msgs, avg {:.6}s, {:?}, jitter {:?}, {} anomalies",
            stream.id,
            n,
            p.average_interval,
            p.regularity,
            j.jitter_level,
            d.anomaly_count()
        );

        sections.periodicity.insert(stream.id.clone(), p);
        sections.jitter.insert(stream.id.clone(), j);
        sections.deviations.insert(stream.id.clone(), d);
        sections.intervals.insert(stream.id.clone(), stream.intervals.clone());
    }

    sections
}
