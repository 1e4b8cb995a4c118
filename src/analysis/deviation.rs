//! Deviation analyzer: timing outliers, sequence issues and the word passes.
//!
//! The passes are independent; their anomalies are merged into one list in
//! a fixed order (outliers, status, command, data, sequence) so reports are
//! reproducible.

use serde::{Deserialize, Serialize};

use crate::aggregate::Stream;
use crate::analysis::words::{
    analyze_command_words, analyze_data_words, analyze_status_words, CommandWordReport,
    DataWordReport, StatusWordReport,
};
use crate::config::{AnalysisConfig, AnalysisMode};
use crate::models::{Anomaly, AnomalyType, Severity};
use crate::stats::{self, round6};

/// Tukey fences used by the outlier pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationStats {
    // ---
    pub message_count: usize,
    pub timing_outliers: usize,
    /// Absent when the stream has too few intervals for the outlier pass.
    pub outlier_bounds: Option<OutlierBounds>,
    /// Median interval, the reference for sequence checks.
    pub expected_interval: f64,
    pub sequence_issues: usize,
    pub anomalies: Vec<Anomaly>,
    pub status_words: Option<StatusWordReport>,
    pub command_words: Option<CommandWordReport>,
    pub data_words: Option<DataWordReport>,
}

impl DeviationStats {
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }
}

/// Run every deviation pass that `mode` enables over one stream.
pub fn analyze(
    stream: &Stream<'_>,
    data_columns: &[String],
    mode: AnalysisMode,
    cfg: &AnalysisConfig,
) -> DeviationStats {
    // ---
    let mut anomalies = Vec::new();

    let (outlier_bounds, outliers) = timing_outliers(stream, cfg);
    let timing_outliers = outliers.len();
    anomalies.extend(outliers);

    let (status_words, command_words, data_words) = match mode {
        AnalysisMode::Full => {
            let status = analyze_status_words(&stream.records);
            let command = analyze_command_words(&stream.records);
            let data = analyze_data_words(&stream.records, data_columns, cfg);

            anomalies.extend(status.errors.iter().cloned());
            anomalies.extend(status.warnings.iter().cloned());
            anomalies.extend(command.violations.iter().cloned());
            anomalies.extend(data.anomalies.iter().cloned());
            (Some(status), Some(command), Some(data))
        }
        AnalysisMode::Timing => (None, None, None),
    };

    let expected_interval = stats::median(&stream.intervals);
    let (sequence_issues, sequence_anomalies) = sequence_issues(stream, expected_interval, cfg);
    anomalies.extend(sequence_anomalies);

    DeviationStats {
        message_count: stream.len(),
        timing_outliers,
        outlier_bounds,
        expected_interval: round6(expected_interval),
        sequence_issues,
        anomalies,
        status_words,
        command_words,
        data_words,
    }
}

/// IQR outlier detection over the interval series.
///
/// Interval `i` separates records `i` and `i + 1`; its anomaly is located at
/// the later record.
fn timing_outliers(stream: &Stream<'_>, cfg: &AnalysisConfig) -> (Option<OutlierBounds>, Vec<Anomaly>) {
    // ---
    let intervals = &stream.intervals;
    if intervals.len() <= cfg.outlier_min_intervals {
        return (None, Vec::new());
    }

    let q1 = stats::quantile(intervals, 0.25);
    let q3 = stats::quantile(intervals, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - cfg.iqr_factor * iqr;
    let upper = q3 + cfg.iqr_factor * iqr;

    let found = intervals
        .iter()
        .enumerate()
        .filter(|(_, iv)| **iv < lower || **iv > upper)
        .map(|(i, iv)| {
            let severity = if *iv > 2.0 * upper || *iv < 0.5 * lower {
                Severity::High
            } else {
                Severity::Moderate
            };
            Anomaly::new(
                AnomalyType::TimingOutlier,
                severity,
                format!(
                    "interval {:.6}s outside expected range [{:.6}, {:.6}]",
                    iv, lower, upper
                ),
            )
            .at_time(stream.records[i + 1].relative_time)
            .at_occurrence(i + 1)
        })
        .collect();

    let bounds = OutlierBounds {
        q1: round6(q1),
        q3: round6(q3),
        iqr: round6(iqr),
        lower: round6(lower),
        upper: round6(upper),
    };
    (Some(bounds), found)
}

/// Intervals straying from the median by more than the tolerance.
///
/// Every deviating interval counts as an issue; only clearly late (more than
/// double) or early (less than half) ones produce an anomaly.
fn sequence_issues(stream: &Stream<'_>, expected: f64, cfg: &AnalysisConfig) -> (usize, Vec<Anomaly>) {
    // ---
    if expected <= 0.0 {
        return (0, Vec::new());
    }
    let tolerance = cfg.sequence_tolerance * expected;

    let mut count = 0;
    let mut found = Vec::new();
    for (i, iv) in stream.intervals.iter().enumerate() {
        if (iv - expected).abs() <= tolerance {
            continue;
        }
        count += 1;

        let finding = if *iv > 2.0 * expected {
            Some((AnomalyType::DelayedMessage, Severity::Moderate, "delayed"))
        } else if *iv < 0.5 * expected {
            Some((AnomalyType::EarlyMessage, Severity::Low, "early"))
        } else {
            None
        };
        if let Some((kind, severity, label)) = finding {
            found.push(
                Anomaly::new(
                    kind,
                    severity,
                    format!("message {label}: interval {iv:.6}s vs expected {expected:.6}s"),
                )
                .at_time(stream.records[i + 1].relative_time)
                .at_occurrence(i + 1),
            );
        }
    }
    (count, found)
}
