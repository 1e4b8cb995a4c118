//! Health scorer: rolls every per-stream finding into one score, label and
//! recommendation list.
//!
//! Scoring starts at 100 and subtracts a fixed deduction per qualifying
//! stream or event (see [`HealthDeductions`]), floored at 0. Nothing is
//! weighted or normalized, so the score only ever moves down as counters
//! grow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::deviation::DeviationStats;
use crate::analysis::jitter::JitterStats;
use crate::analysis::periodicity::PeriodicityStats;
use crate::config::{AnalysisConfig, HealthCutoffs, HealthDeductions};
use crate::models::{AnomalyType, Severity};

pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64, cutoffs: &HealthCutoffs) -> Self {
        // ---
        match score {
            s if s >= cutoffs.excellent => Self::Excellent,
            s if s >= cutoffs.good => Self::Good,
            s if s >= cutoffs.fair => Self::Fair,
            s if s >= cutoffs.poor => Self::Poor,
            _ => Self::Critical,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Fair => "FAIR",
            Self::Poor => "POOR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Batch-wide counters the score and recommendations are derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounts {
    // ---
    pub irregular_streams: usize,
    pub high_jitter_streams: usize,
    pub total_anomalies: usize,
    pub critical_anomalies: usize,
    pub message_errors: usize,
    pub busy_occurrences: usize,
    pub command_violations: usize,
    pub data_integrity_issues: usize,
}

impl HealthCounts {
    /// Tally counters across every analyzed stream.
    pub fn collect(
        periodicity: &BTreeMap<String, PeriodicityStats>,
        jitter: &BTreeMap<String, JitterStats>,
        deviations: &BTreeMap<String, DeviationStats>,
    ) -> Self {
        // ---
        let mut counts = HealthCounts {
            irregular_streams: periodicity
                .values()
                .filter(|p| p.regularity.is_irregular())
                .count(),
            high_jitter_streams: jitter.values().filter(|j| j.jitter_level.is_high()).count(),
            ..Default::default()
        };

        for d in deviations.values() {
            counts.total_anomalies += d.anomalies.len();
            for a in &d.anomalies {
                if a.severity == Severity::Critical {
                    counts.critical_anomalies += 1;
                }
                if a.kind == AnomalyType::CommandWordError {
                    counts.command_violations += 1;
                }
                if a.kind.is_data_integrity() {
                    counts.data_integrity_issues += 1;
                }
            }
            if let Some(sw) = &d.status_words {
                counts.message_errors += sw.bit_statistics.message_error;
                counts.busy_occurrences += sw.bit_statistics.busy;
            }
        }

        counts
    }

    pub fn is_clean(&self) -> bool {
        *self == HealthCounts::default()
    }
}

/// Score from counters: 100 minus every deduction, clamped to `[0, 100]`.
pub fn score(counts: &HealthCounts, d: &HealthDeductions) -> f64 {
    // ---
    let n = |c: usize| c as f64;
    let deducted = n(counts.irregular_streams) * d.irregular_stream
        + n(counts.high_jitter_streams) * d.high_jitter_stream
        + n(counts.total_anomalies) * d.anomaly
        + n(counts.critical_anomalies) * d.critical_anomaly
        + n(counts.message_errors) * d.message_error
        + n(counts.busy_occurrences) * d.busy
        + n(counts.command_violations) * d.command_violation
        + n(counts.data_integrity_issues) * d.data_integrity;

    (MAX_SCORE - deducted).clamp(0.0, MAX_SCORE)
}

pub const NORMAL_OPERATION: &str = "Bus is operating within normal parameters.";

/// Fixed-template recommendations, in a fixed order.
///
/// The normal-operation note is added only when every counter is zero, so a
/// batch with sub-threshold findings (busy bits, plain anomalies) may come
/// back with no recommendations at all.
pub fn recommendations(counts: &HealthCounts, score: f64, cfg: &AnalysisConfig) -> Vec<String> {
    // ---
    let mut out = Vec::new();

    if score < cfg.status_cutoffs.fair {
        let status = HealthStatus::from_score(score, &cfg.status_cutoffs);
        out.push(format!(
            "Overall bus health is {} ({score:.0}/100); review this capture in detail before further use.",
            status.label()
        ));
    }
    if counts.message_errors > 0 {
        out.push(format!(
            "{} Message Error status bit(s) observed; inspect the reporting remote terminals and bus wiring.",
            counts.message_errors
        ));
    }
    if counts.command_violations > 0 {
        out.push(format!(
            "{} command word protocol violation(s) detected; verify bus controller command generation.",
            counts.command_violations
        ));
    }
    if counts.data_integrity_issues > 0 {
        out.push(format!(
            "{} data word integrity issue(s) found; check for stuck bits and incomplete payloads.",
            counts.data_integrity_issues
        ));
    }
    if counts.irregular_streams > 0 {
        out.push(format!(
            "{} stream(s) show irregular periodicity; review bus controller scheduling.",
            counts.irregular_streams
        ));
    }
    if counts.high_jitter_streams > 0 {
        out.push(format!(
            "{} stream(s) show high timing jitter; check bus loading and terminal response times.",
            counts.high_jitter_streams
        ));
    }
    if counts.critical_anomalies > 0 {
        out.push(format!(
            "{} critical issue(s) require immediate attention.",
            counts.critical_anomalies
        ));
    }

    if counts.is_clean() {
        out.push(NORMAL_OPERATION.to_string());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    // ---
    pub score: f64,
    pub status: HealthStatus,
    pub counts: HealthCounts,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn from_counts(counts: HealthCounts, cfg: &AnalysisConfig) -> Self {
        // ---
        let score = score(&counts, &cfg.deductions);
        HealthReport {
            score,
            status: HealthStatus::from_score(score, &cfg.status_cutoffs),
            recommendations: recommendations(&counts, score, cfg),
            counts,
        }
    }

    pub fn assess(
        periodicity: &BTreeMap<String, PeriodicityStats>,
        jitter: &BTreeMap<String, JitterStats>,
        deviations: &BTreeMap<String, DeviationStats>,
        cfg: &AnalysisConfig,
    ) -> Self {
        Self::from_counts(HealthCounts::collect(periodicity, jitter, deviations), cfg)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_clean_batch_is_excellent() {
        // ---
        let cfg = AnalysisConfig::default();
        let h = HealthReport::from_counts(HealthCounts::default(), &cfg);

        assert_eq!(h.score, 100.0);
        assert_eq!(h.status, HealthStatus::Excellent);
        assert_eq!(h.recommendations, vec![NORMAL_OPERATION.to_string()]);
        assert!(h.counts.is_clean());
    }

    #[test]
    fn test_each_deduction() {
        // ---
        let d = HealthDeductions::default();
        let one = |f: fn(&mut HealthCounts)| {
            let mut c = HealthCounts::default();
            f(&mut c);
            MAX_SCORE - score(&c, &d)
        };

        assert_eq!(one(|c| c.irregular_streams = 1), 10.0);
        assert_eq!(one(|c| c.high_jitter_streams = 1), 15.0);
        assert_eq!(one(|c| c.total_anomalies = 1), 5.0);
        assert_eq!(one(|c| c.critical_anomalies = 1), 10.0);
        assert_eq!(one(|c| c.message_errors = 1), 20.0);
        assert_eq!(one(|c| c.busy_occurrences = 1), 5.0);
        assert_eq!(one(|c| c.command_violations = 1), 15.0);
        assert_eq!(one(|c| c.data_integrity_issues = 1), 8.0);
    }

    #[test]
    fn test_score_is_floored() {
        // ---
        let d = HealthDeductions::default();
        let c = HealthCounts {
            message_errors: 50,
            ..Default::default()
        };
        assert_eq!(score(&c, &d), 0.0);
    }

    #[test]
    fn test_status_labels() {
        // ---
        let cut = HealthCutoffs::default();
        assert_eq!(HealthStatus::from_score(90.0, &cut), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(89.9, &cut), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(75.0, &cut), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(60.0, &cut), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(40.0, &cut), HealthStatus::Poor);
        assert_eq!(HealthStatus::from_score(39.9, &cut), HealthStatus::Critical);
    }

    #[test]
    fn test_recommendation_order() {
        // ---
        let cfg = AnalysisConfig::default();
        let counts = HealthCounts {
            irregular_streams: 1,
            high_jitter_streams: 1,
            total_anomalies: 3,
            critical_anomalies: 1,
            message_errors: 1,
            busy_occurrences: 0,
            command_violations: 1,
            data_integrity_issues: 1,
        };
        let h = HealthReport::from_counts(counts, &cfg);
        // 10 + 15 + 15 + 10 + 20 + 15 + 8 = 93
        assert_eq!(h.score, 7.0);
        assert_eq!(h.status, HealthStatus::Critical);

        let r = &h.recommendations;
        assert_eq!(r.len(), 7);
        assert!(r[0].starts_with("Overall bus health is CRITICAL"));
        assert!(r[1].contains("Message Error"));
        assert!(r[2].contains("command word"));
        assert!(r[3].contains("data word"));
        assert!(r[4].contains("irregular periodicity"));
        assert!(r[5].contains("jitter"));
        assert!(r[6].contains("critical issue"));
    }

    #[test]
    fn test_busy_only_has_no_normal_note() {
        // ---
        let cfg = AnalysisConfig::default();
        let counts = HealthCounts {
            busy_occurrences: 1,
            total_anomalies: 1,
            ..Default::default()
        };
        let h = HealthReport::from_counts(counts, &cfg);
        assert_eq!(h.score, 90.0);
        assert!(h.recommendations.is_empty(), "{:?}", h.recommendations);
    }
}
