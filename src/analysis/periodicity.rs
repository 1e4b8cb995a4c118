//! Periodicity analyzer: interval summary and regularity classification.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::stats::{self, round6};

/// How regular a stream's message spacing is, from its coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regularity {
    HighlyRegular,
    Regular,
    ModeratelyIrregular,
    HighlyIrregular,
}

impl Regularity {
    /// Classify a coefficient of variation (strict `<` cutoffs).
    pub fn from_cv(cv: f64, cfg: &AnalysisConfig) -> Self {
        // ---
        match cv {
            cv if cv < cfg.cv_highly_regular => Self::HighlyRegular,
            cv if cv < cfg.cv_regular => Self::Regular,
            cv if cv < cfg.cv_moderately_irregular => Self::ModeratelyIrregular,
            _ => Self::HighlyIrregular,
        }
    }

    pub fn is_irregular(self) -> bool {
        matches!(self, Self::ModeratelyIrregular | Self::HighlyIrregular)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicityStats {
    // ---
    pub message_count: usize,
    pub average_interval: f64,
    pub min_interval: f64,
    pub max_interval: f64,
    /// Messages per second; 0 when the average interval is not positive.
    pub expected_frequency: f64,
    pub coefficient_of_variation: f64,
    pub regularity: Regularity,
}

/// Summarize one stream's interval series.
///
/// A non-positive mean interval has no meaningful frequency or cv: both are
/// reported as 0 and the stream is classified `HIGHLY_IRREGULAR`.
pub fn analyze(intervals: &[f64], message_count: usize, cfg: &AnalysisConfig) -> PeriodicityStats {
    // ---
    let mean = stats::mean(intervals);

    let (expected_frequency, cv, regularity) = if mean > 0.0 {
        let cv = stats::std_dev(intervals) / mean;
        (1.0 / mean, cv, Regularity::from_cv(cv, cfg))
    } else {
        (0.0, 0.0, Regularity::HighlyIrregular)
    };

    PeriodicityStats {
        message_count,
        average_interval: round6(mean),
        min_interval: round6(stats::min(intervals)),
        max_interval: round6(stats::max(intervals)),
        expected_frequency: round6(expected_frequency),
        coefficient_of_variation: round6(cv),
        regularity,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_regularity_cutoffs_are_strict() {
        // ---
        let cfg = AnalysisConfig::default();
        assert_eq!(Regularity::from_cv(0.0, &cfg), Regularity::HighlyRegular);
        assert_eq!(Regularity::from_cv(0.099_999, &cfg), Regularity::HighlyRegular);
        assert_eq!(Regularity::from_cv(0.1, &cfg), Regularity::Regular);
        assert_eq!(Regularity::from_cv(0.3, &cfg), Regularity::ModeratelyIrregular);
        assert_eq!(Regularity::from_cv(0.5, &cfg), Regularity::HighlyIrregular);
        assert_eq!(Regularity::from_cv(f64::NAN, &cfg), Regularity::HighlyIrregular);
    }

    #[test]
    fn test_constant_intervals() {
        // ---
        let cfg = AnalysisConfig::default();
        let p = analyze(&[0.02; 49], 50, &cfg);

        assert_eq!(p.message_count, 50);
        assert_eq!(p.average_interval, 0.02);
        assert_eq!(p.min_interval, 0.02);
        assert_eq!(p.max_interval, 0.02);
        assert_eq!(p.expected_frequency, 50.0);
        assert_eq!(p.coefficient_of_variation, 0.0);
        assert_eq!(p.regularity, Regularity::HighlyRegular);
    }

    #[test]
    fn test_zero_mean_guard() {
        // ---
        let cfg = AnalysisConfig::default();
        let p = analyze(&[0.0, 0.0], 3, &cfg);

        assert_eq!(p.expected_frequency, 0.0);
        assert_eq!(p.coefficient_of_variation, 0.0);
        assert_eq!(p.regularity, Regularity::HighlyIrregular);
        assert!(p.regularity.is_irregular());
    }

    #[test]
    fn test_irregular_stream() {
        // ---
        let cfg = AnalysisConfig::default();
        let p = analyze(&[0.01, 0.05, 0.01, 0.05], 5, &cfg);

        // mean 0.03, std 0.02
        assert_eq!(p.average_interval, 0.03);
        assert_eq!(p.min_interval, 0.01);
        assert_eq!(p.max_interval, 0.05);
        assert_eq!(p.regularity, Regularity::HighlyIrregular);
    }
}
