//! Column schema checks for capture tables.
//!
//! Resolves which table columns feed which record fields before any row is
//! touched. A missing mandatory column is the only batch-fatal error in the
//! engine; it is reported once, naming every missing column.

use tracing::warn;

use crate::config::AnalysisMode;
use crate::error::EngineError;
use crate::models::RawTable;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Decoded-info column names, in order of preference.
pub const DECODED_INFO_COLUMNS: [&str; 2] = ["Decoded Info", "Message Type"];
pub const CW1_COLUMN: &str = "CW1";
pub const CW2_COLUMN: &str = "CW2";
/// Status word column names, in order of preference.
pub const STATUS_COLUMNS: [&str; 2] = ["SW1", "Status Word"];
pub const DATA_WORD_PREFIX: &str = "DW";
pub const MAX_DATA_WORDS: u8 = 32;

// ---

/// Where each record field is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    // ---
    pub timestamp: String,
    pub decoded_info: String,
    pub command_word_1: Option<String>,
    pub command_word_2: Option<String>,
    pub status_word: Option<String>,
    /// Data word columns sorted by word number.
    pub data_words: Vec<String>,
}

/// Check the table against the columns `mode` requires and resolve the layout.
///
/// Optional columns that happen to be present are picked up in either mode.
pub fn resolve_columns(table: &RawTable, mode: AnalysisMode) -> Result<ColumnLayout, EngineError> {
    // ---
    let mut missing = Vec::new();

    if !table.has_column(TIMESTAMP_COLUMN) {
        missing.push(TIMESTAMP_COLUMN.to_string());
    }
    let decoded_info = first_present(table, &DECODED_INFO_COLUMNS);
    if decoded_info.is_none() {
        missing.push(DECODED_INFO_COLUMNS[0].to_string());
    }

    let command_word_1 = table.has_column(CW1_COLUMN).then(|| CW1_COLUMN.to_string());
    let command_word_2 = table.has_column(CW2_COLUMN).then(|| CW2_COLUMN.to_string());
    let status_word = first_present(table, &STATUS_COLUMNS);
    let data_words = data_word_columns(table);

    if mode == AnalysisMode::Full {
        if command_word_1.is_none() {
            missing.push(CW1_COLUMN.to_string());
        }
        if status_word.is_none() {
            missing.push(STATUS_COLUMNS[0].to_string());
        }
        if data_words.is_empty() {
            missing.push(format!("{DATA_WORD_PREFIX}1..{DATA_WORD_PREFIX}{MAX_DATA_WORDS}"));
        }
    }

    if !missing.is_empty() {
        warn!("Rejecting batch, missing columns: {:?}", missing);
        return Err(EngineError::Schema { missing });
    }

    Ok(ColumnLayout {
        timestamp: TIMESTAMP_COLUMN.to_string(),
        // checked above
        decoded_info: decoded_info.unwrap_or_default(),
        command_word_1,
        command_word_2,
        status_word,
        data_words,
    })
}

fn first_present(table: &RawTable, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| table.has_column(c))
        .map(|c| c.to_string())
}

/// `DW<n>` columns with `n` in `1..=32`, ordered by `n`.
fn data_word_columns(table: &RawTable) -> Vec<String> {
    // ---
    let mut numbered: Vec<(u8, &String)> = table
        .columns
        .iter()
        .filter_map(|c| {
            let n = c.strip_prefix(DATA_WORD_PREFIX)?.parse::<u8>().ok()?;
            (1..=MAX_DATA_WORDS).contains(&n).then_some((n, c))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    numbered.dedup_by_key(|(n, _)| *n);
    numbered.into_iter().map(|(_, c)| c.clone()).collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn table(cols: &[&str]) -> RawTable {
        RawTable::new(cols.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_timing_mode_needs_only_timestamp_and_info() {
        // ---
        let layout = resolve_columns(&table(&["Timestamp", "Message Type"]), AnalysisMode::Timing)
            .unwrap();
        assert_eq!(layout.decoded_info, "Message Type");
        assert!(layout.command_word_1.is_none());
        assert!(layout.data_words.is_empty());
    }

    #[test]
    fn test_missing_columns_are_all_named() {
        // ---
        let err = resolve_columns(&table(&["Decoded Info", "DW1"]), AnalysisMode::Full).unwrap_err();
        assert_eq!(
            err,
            EngineError::Schema {
                missing: vec!["Timestamp".into(), "CW1".into(), "SW1".into()]
            }
        );
    }

    #[test]
    fn test_full_mode_requires_a_data_word_column() {
        // ---
        let err = resolve_columns(
            &table(&["Timestamp", "Decoded Info", "CW1", "SW1"]),
            AnalysisMode::Full,
        )
        .unwrap_err();
        let EngineError::Schema { missing } = err;
        assert_eq!(missing, vec!["DW1..DW32".to_string()]);
    }

    #[test]
    fn test_data_word_columns_sorted_numerically() {
        // ---
        let layout = resolve_columns(
            &table(&[
                "Timestamp", "Decoded Info", "CW1", "CW2", "Status Word", "DW10", "DW2", "DW1",
                "DW33", "DWx",
            ]),
            AnalysisMode::Full,
        )
        .unwrap();
        assert_eq!(layout.data_words, vec!["DW1", "DW2", "DW10"]);
        assert_eq!(layout.status_word.as_deref(), Some("Status Word"));
        assert_eq!(layout.command_word_2.as_deref(), Some("CW2"));
    }
}
