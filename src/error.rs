//! Error taxonomy for the analysis engine.
//!
//! Only a missing mandatory column aborts a batch. Everything else is
//! per-cell and non-fatal: a bad word becomes "no value", a bad timestamp
//! drops its row.

use thiserror::Error;

/// Batch-level failure. Returned from [`crate::analyze_table`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Required columns are absent from the input table.
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
}

/// Why a single 16-bit word cell could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not a number: {0:?}")]
    Malformed(String),

    #[error("word value is not finite: {0}")]
    NotFinite(String),

    #[error("unsupported cell type: {0}")]
    UnsupportedType(&'static str),
}

/// Why a timestamp cell could not be turned into seconds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimestampError {
    #[error("timestamp cell is empty")]
    Missing,

    #[error("timestamp {0:?} does not match HH:MM:SS.ffffff")]
    BadFormat(String),

    #[error("timestamp value {0} is not a finite number of seconds")]
    NotFinite(f64),
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn schema_error_names_every_missing_column() {
        // ---
        let err = EngineError::Schema {
            missing: vec!["CW1".to_string(), "SW1".to_string()],
        };
        assert_eq!(err.to_string(), "missing required column(s): CW1, SW1");
    }
}
