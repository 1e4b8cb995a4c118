//! Jitter analyzer: spread of a stream's intervals around their mean.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::stats::{self, round6};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JitterLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl JitterLevel {
    /// Classify a jitter percentage (strict `<` cutoffs).
    pub fn from_percentage(pct: f64, cfg: &AnalysisConfig) -> Self {
        // ---
        match pct {
            p if p < cfg.jitter_low_pct => Self::Low,
            p if p < cfg.jitter_moderate_pct => Self::Moderate,
            p if p < cfg.jitter_high_pct => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterStats {
    // ---
    pub message_count: usize,
    pub jitter_std_dev: f64,
    pub jitter_variance: f64,
    pub coefficient_of_variation: f64,
    pub jitter_range: f64,
    /// `std / mean * 100`; 0 when the mean is not positive.
    pub jitter_percentage: f64,
    pub jitter_level: JitterLevel,
}

pub fn analyze(intervals: &[f64], message_count: usize, cfg: &AnalysisConfig) -> JitterStats {
    // ---
    let std_dev = stats::std_dev(intervals);
    let cv = stats::coefficient_of_variation(intervals);
    let pct = cv * 100.0;

    JitterStats {
        message_count,
        jitter_std_dev: round6(std_dev),
        jitter_variance: round6(stats::variance(intervals)),
        coefficient_of_variation: round6(cv),
        jitter_range: round6(stats::max(intervals) - stats::min(intervals)),
        jitter_percentage: round6(pct),
        jitter_level: JitterLevel::from_percentage(pct, cfg),
    }
}
