//! Configuration for the `milbus-diagnostics` engine and its driver binary.
//!
//! Two layers live here. [`AnalysisConfig`] gathers every classification
//! threshold and health deduction the analyzers use, with documented
//! defaults, so boundary behavior can be asserted without touching call
//! sites. [`Config`] is the runtime configuration of the driver, loaded
//! from environment variables (with optional `.env` file support provided
//! by the caller).
use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Parse an optional environment variable of any `FromStr` type with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

// ---

/// Which passes the engine runs, and therefore which columns it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Timestamp and decoded info only: periodicity, jitter, timing deviations.
    Timing,
    /// Timing plus command, status and data word analysis.
    #[default]
    Full,
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // ---
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(AnalysisMode::Full),
            "timing" | "basic" => Ok(AnalysisMode::Timing),
            other => Err(format!("unknown analysis mode {other:?} (expected full|timing)")),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Timing => f.write_str("timing"),
            AnalysisMode::Full => f.write_str("full"),
        }
    }
}

/// Thresholds and weights used by the analyzers and the health scorer.
///
/// All classification cutoffs are strict `<` comparisons, so a value sitting
/// exactly on a cutoff falls into the bucket above it: `cv == 0.1` is
/// `REGULAR`, not `HIGHLY_REGULAR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // ---
    /// Streams shorter than this are left out of every per-stream section.
    pub min_stream_len: usize,

    /// Coefficient-of-variation cutoffs for regularity classification.
    pub cv_highly_regular: f64,
    pub cv_regular: f64,
    pub cv_moderately_irregular: f64,

    /// Jitter percentage cutoffs (std / mean * 100).
    pub jitter_low_pct: f64,
    pub jitter_moderate_pct: f64,
    pub jitter_high_pct: f64,

    /// Multiplier on IQR for the outlier fences.
    pub iqr_factor: f64,
    /// The outlier pass runs only with strictly more intervals than this.
    pub outlier_min_intervals: usize,

    /// Fraction of the median interval tolerated before a sequence issue.
    pub sequence_tolerance: f64,

    /// Share of all data words one value may hold before it is flagged.
    pub stuck_value_ratio: f64,
    pub repeated_value_ratio: f64,
    /// A column used less than this share of the busiest column is rare.
    pub rare_column_ratio: f64,
    /// Missing words per row at or above which severity becomes HIGH.
    pub missing_words_high: usize,
    /// Share of zero-valued expected words that is suspicious.
    pub zero_concentration_ratio: f64,

    pub deductions: HealthDeductions,
    pub status_cutoffs: HealthCutoffs,
}

/// Points removed from the starting health score of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDeductions {
    pub irregular_stream: f64,
    pub high_jitter_stream: f64,
    pub anomaly: f64,
    pub critical_anomaly: f64,
    pub message_error: f64,
    pub busy: f64,
    pub command_violation: f64,
    pub data_integrity: f64,
}

/// Minimum scores for each health status label (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCutoffs {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        // ---
        Self {
            min_stream_len: 3,
            cv_highly_regular: 0.1,
            cv_regular: 0.3,
            cv_moderately_irregular: 0.5,
            jitter_low_pct: 5.0,
            jitter_moderate_pct: 15.0,
            jitter_high_pct: 30.0,
            iqr_factor: 1.5,
            outlier_min_intervals: 4,
            sequence_tolerance: 0.5,
            stuck_value_ratio: 0.5,
            repeated_value_ratio: 0.25,
            rare_column_ratio: 0.1,
            missing_words_high: 5,
            zero_concentration_ratio: 0.8,
            deductions: HealthDeductions::default(),
            status_cutoffs: HealthCutoffs::default(),
        }
    }
}

impl Default for HealthDeductions {
    fn default() -> Self {
        Self {
            irregular_stream: 10.0,
            high_jitter_stream: 15.0,
            anomaly: 5.0,
            critical_anomaly: 10.0,
            message_error: 20.0,
            busy: 5.0,
            command_violation: 15.0,
            data_integrity: 8.0,
        }
    }
}

impl Default for HealthCutoffs {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 75.0,
            fair: 60.0,
            poor: 40.0,
        }
    }
}

// ---

/// Strongly typed driver configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Capture file to analyze (CSV, or JSON `{columns, rows}`).
    pub input_path: Option<String>,

    /// Which analysis passes to run.
    pub mode: AnalysisMode,

    /// Pretty-print the JSON report.
    pub pretty_json: bool,

    /// Engine thresholds, defaults with any environment overrides applied.
    pub analysis: AnalysisConfig,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BUS_LOG_FILE` – capture file path (the first CLI argument wins over this)
/// - `BUS_ANALYSIS_MODE` – `full` or `timing` (default: `full`)
/// - `BUS_PRETTY_JSON` – `true`/`false` (default: `true`)
/// - `BUS_MIN_STREAM_LEN` – minimum records per analyzed stream (default: 3)
/// - `BUS_IQR_FACTOR` – outlier fence multiplier (default: 1.5)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = AnalysisConfig::default();

    let input_path = env::var("BUS_LOG_FILE").ok().filter(|p| !p.trim().is_empty());
    let mode = parse_env!("BUS_ANALYSIS_MODE", AnalysisMode, AnalysisMode::Full);
    let pretty_json = parse_env!("BUS_PRETTY_JSON", bool, true);
    let min_stream_len = parse_env!("BUS_MIN_STREAM_LEN", usize, defaults.min_stream_len);
    let iqr_factor = parse_env!("BUS_IQR_FACTOR", f64, defaults.iqr_factor);

    if min_stream_len < 2 {
        return Err(anyhow!(
            "Invalid BUS_MIN_STREAM_LEN: {} (need at least 2 records to form an interval)",
            min_stream_len
        ));
    }
    if !iqr_factor.is_finite() || iqr_factor < 0.0 {
        return Err(anyhow!("Invalid BUS_IQR_FACTOR: {}", iqr_factor));
    }

    Ok(Config {
        input_path,
        mode,
        pretty_json,
        analysis: AnalysisConfig {
            min_stream_len,
            iqr_factor,
            ..defaults
        },
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!(
            "  BUS_LOG_FILE       : {}",
            self.input_path.as_deref().unwrap_or("<from argument>")
        );
        tracing::info!("  BUS_ANALYSIS_MODE  : {}", self.mode);
        tracing::info!("  BUS_PRETTY_JSON    : {}", self.pretty_json);
        tracing::info!("  BUS_MIN_STREAM_LEN : {}", self.analysis.min_stream_len);
        tracing::info!("  BUS_IQR_FACTOR     : {}", self.analysis.iqr_factor);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_thresholds() {
        // ---
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.min_stream_len, 3);
        assert_eq!(cfg.cv_highly_regular, 0.1);
        assert_eq!(cfg.cv_regular, 0.3);
        assert_eq!(cfg.cv_moderately_irregular, 0.5);
        assert_eq!(cfg.jitter_low_pct, 5.0);
        assert_eq!(cfg.jitter_moderate_pct, 15.0);
        assert_eq!(cfg.jitter_high_pct, 30.0);
        assert_eq!(cfg.deductions.message_error, 20.0);
        assert_eq!(cfg.status_cutoffs.excellent, 90.0);
    }

    #[test]
    fn test_analysis_mode_parsing() {
        // ---
        assert_eq!("full".parse::<AnalysisMode>(), Ok(AnalysisMode::Full));
        assert_eq!("Timing".parse::<AnalysisMode>(), Ok(AnalysisMode::Timing));
        assert_eq!("basic".parse::<AnalysisMode>(), Ok(AnalysisMode::Timing));
        assert!("fast".parse::<AnalysisMode>().is_err());
    }
}
