//! The analysis report handed to presentation layers, and its sanitization.
//!
//! Downstream consumers (JSON encoders, plotting) cannot represent NaN or
//! infinity, so every float in the report passes through [`Sanitize`]
//! before it leaves the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::deviation::{DeviationStats, OutlierBounds};
use crate::analysis::health::HealthReport;
use crate::analysis::jitter::JitterStats;
use crate::analysis::periodicity::PeriodicityStats;
use crate::analysis::words::{CommandWordReport, DataWordReport, StatusWordReport, ValueFrequency};
use crate::config::AnalysisMode;
use crate::models::Anomaly;

/// Batch-level bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    // ---
    pub total_rows: usize,
    /// Rows dropped for an unparsable timestamp.
    pub dropped_rows: usize,
    pub normalized_records: usize,
    /// Distinct stream ids, analyzable or not.
    pub stream_count: usize,
    pub analyzed_streams: usize,
    /// Streams below the minimum length, absent from every section.
    pub excluded_streams: usize,
    /// Seconds from the first to the last surviving record.
    pub capture_duration: f64,
}

/// Full engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    // ---
    pub mode: AnalysisMode,
    pub summary: BatchSummary,
    pub periodicity: BTreeMap<String, PeriodicityStats>,
    pub jitter: BTreeMap<String, JitterStats>,
    pub deviations: BTreeMap<String, DeviationStats>,
    /// Raw interval series per stream, for external plotting.
    pub intervals: BTreeMap<String, Vec<f64>>,
    pub health: HealthReport,
}

// ---

/// Replace every non-finite float reachable from `self` with 0.
pub trait Sanitize {
    fn sanitize(&mut self);
}

impl Sanitize for f64 {
    fn sanitize(&mut self) {
        if !self.is_finite() {
            *self = 0.0;
        }
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(&mut self) {
        self.iter_mut().for_each(Sanitize::sanitize);
    }
}

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize(&mut self) {
        if let Some(v) = self {
            v.sanitize();
        }
    }
}

impl<K: Ord, V: Sanitize> Sanitize for BTreeMap<K, V> {
    fn sanitize(&mut self) {
        self.values_mut().for_each(Sanitize::sanitize);
    }
}

/// Sanitize the listed fields of a struct.
macro_rules! sanitize_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl Sanitize for $ty {
            fn sanitize(&mut self) {
                $(self.$field.sanitize();)*
            }
        }
    };
}

sanitize_fields!(Anomaly { timestamp });
sanitize_fields!(OutlierBounds { q1, q3, iqr, lower, upper });
sanitize_fields!(ValueFrequency { share });
sanitize_fields!(StatusWordReport { errors, warnings });
sanitize_fields!(CommandWordReport { violations });
sanitize_fields!(DataWordReport { most_common, anomalies });
sanitize_fields!(PeriodicityStats {
    average_interval,
    min_interval,
    max_interval,
    expected_frequency,
    coefficient_of_variation,
});
sanitize_fields!(JitterStats {
    jitter_std_dev,
    jitter_variance,
    coefficient_of_variation,
    jitter_range,
    jitter_percentage,
});
sanitize_fields!(DeviationStats {
    outlier_bounds,
    expected_interval,
    anomalies,
    status_words,
    command_words,
    data_words,
});
sanitize_fields!(HealthReport { score });
sanitize_fields!(BatchSummary { capture_duration });
sanitize_fields!(AnalysisReport {
    summary,
    periodicity,
    jitter,
    deviations,
    intervals,
    health,
});

impl AnalysisReport {
    /// Consume and return the report with all floats finite.
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}
