//! Data models shared by every stage of the bus analysis pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---

/// One spreadsheet cell as handed over by the ingestion layer.
///
/// Spreadsheet readers mix native numbers, text and blanks in the same
/// column, so every word column is carried untyped until the decoder sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    // ---
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    // ---
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Text rendering used for free-text columns such as decoded info.
    pub fn as_text(&self) -> String {
        // ---
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.is_nan() => String::new(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

/// A rectangular capture table: column names plus one map per row.
///
/// Deserializes directly from the `{ "columns": [...], "rows": [...] }`
/// document produced by the upload layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    // ---
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, Cell>>,
}

impl RawTable {
    // ---
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row given as `(column, cell)` pairs.
    pub fn push_row<I, K>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        // ---
        self.rows
            .push(cells.into_iter().map(|(k, v)| (k.into(), v)).collect());
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// One captured bus transaction, lifted out of a table row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    // ---
    pub timestamp: Cell,
    pub decoded_info: String,
    pub command_word_1: Option<Cell>,
    pub command_word_2: Option<Cell>,
    pub status_word: Option<Cell>,
    /// Data word cells in `DW1..DWn` column order.
    pub data_words: Vec<Cell>,
}

/// A record with its place on the batch time base and its stream identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    // ---
    pub record: LogRecord,
    /// Position of the row in the original table.
    pub row_index: usize,
    /// Seconds since the earliest surviving timestamp; never negative.
    pub relative_time: f64,
    pub stream_id: String,
}

// ---

/// Anomaly severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let s = match self {
            Severity::Low => "LOW",
            Severity::Moderate => "MODERATE",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// What kind of finding an [`Anomaly`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    // ---
    TimingOutlier,
    DelayedMessage,
    EarlyMessage,
    StatusError,
    StatusWarning,
    CommandWordError,
    StuckBits,
    RepeatedPattern,
    RarelyUsedColumn,
    MissingDataWords,
    ZeroConcentration,
}

impl AnomalyType {
    /// Anomalies raised by the data-word pattern pass.
    pub fn is_data_integrity(self) -> bool {
        // ---
        matches!(
            self,
            AnomalyType::StuckBits
                | AnomalyType::RepeatedPattern
                | AnomalyType::RarelyUsedColumn
                | AnomalyType::MissingDataWords
                | AnomalyType::ZeroConcentration
        )
    }
}

/// A single finding inside one stream.
///
/// Timing passes locate their findings by relative time and interval index;
/// word passes locate theirs by record position. Whichever applies is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    // ---
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<usize>,
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub description: String,
    pub severity: Severity,
}

impl Anomaly {
    // ---
    pub fn new(kind: AnomalyType, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            occurrence: None,
            kind,
            description: description.into(),
            severity,
        }
    }

    pub fn at_time(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn at_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = Some(occurrence);
        self
    }
}
