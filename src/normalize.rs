//! Row normalizer: table rows in, time-ordered stream-tagged records out.
//!
//! Each row is lifted into a [`LogRecord`], its timestamp is parsed, and the
//! surviving rows are rebased so the earliest one sits at `0.0` seconds. Rows
//! whose timestamp does not parse are dropped, never defaulted.

use std::sync::OnceLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::TimestampError;
use crate::models::{Cell, LogRecord, NormalizedRecord, RawTable};
use crate::schema::ColumnLayout;

/// Clock part of the capture timestamp (`HH:MM:SS.ffffff`).
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// The fractional part after the dot carries 1 to 6 digits.
const MAX_FRACTION_DIGITS: usize = 6;

// ---

/// Normalizer output plus the bookkeeping the batch summary needs.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    // ---
    pub records: Vec<NormalizedRecord>,
    pub total_rows: usize,
    pub dropped_rows: usize,
}

/// Normalize every row of `table` according to `layout`.
///
/// The returned records are sorted ascending by `relative_time`; rows with
/// equal times keep their table order.
pub fn normalize(table: &RawTable, layout: &ColumnLayout) -> NormalizedBatch {
    // ---
    let mut parsed: Vec<(usize, f64, LogRecord)> = Vec::with_capacity(table.rows.len());
    let mut dropped_rows = 0;

    for (row_index, row) in table.rows.iter().enumerate() {
        let record = to_record(row, layout);
        match parse_timestamp(&record.timestamp) {
            Ok(seconds) => parsed.push((row_index, seconds, record)),
            Err(e) => {
                debug!("Dropping row {}: {}", row_index, e);
                dropped_rows += 1;
            }
        }
    }

    if dropped_rows > 0 {
        warn!(
            "Dropped {} of {} rows with unparsable timestamps",
            dropped_rows,
            table.rows.len()
        );
    }

    let base = parsed
        .iter()
        .map(|(_, t, _)| *t)
        .reduce(f64::min)
        .unwrap_or(0.0);

    let mut records: Vec<NormalizedRecord> = parsed
        .into_iter()
        .map(|(row_index, seconds, record)| {
            let stream_id = stream_id(&record.decoded_info, row_index);
            NormalizedRecord {
                record,
                row_index,
                relative_time: seconds - base,
                stream_id,
            }
        })
        .collect();

    // stable: equal times keep table order
    records.sort_by(|a, b| a.relative_time.total_cmp(&b.relative_time));

    NormalizedBatch {
        records,
        total_rows: table.rows.len(),
        dropped_rows,
    }
}

fn to_record(row: &std::collections::BTreeMap<String, Cell>, layout: &ColumnLayout) -> LogRecord {
    // ---
    let cell = |col: &Option<String>| col.as_ref().and_then(|c| row.get(c)).cloned();

    LogRecord {
        timestamp: row.get(&layout.timestamp).cloned().unwrap_or(Cell::Null),
        decoded_info: row
            .get(&layout.decoded_info)
            .map(Cell::as_text)
            .unwrap_or_default(),
        command_word_1: cell(&layout.command_word_1),
        command_word_2: cell(&layout.command_word_2),
        status_word: cell(&layout.status_word),
        data_words: layout
            .data_words
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(Cell::Null))
            .collect(),
    }
}

/// Parse a timestamp cell into seconds.
///
/// Text must be [`TIMESTAMP_FORMAT`] followed by a dot and 1 to 6 fraction
/// digits; no other text format is tried. Native numbers are taken as seconds.
pub fn parse_timestamp(cell: &Cell) -> Result<f64, TimestampError> {
    // ---
    match cell {
        Cell::Null => Err(TimestampError::Missing),
        Cell::Bool(b) => Err(TimestampError::BadFormat(b.to_string())),
        Cell::Int(i) => Ok(*i as f64),
        Cell::Float(f) if f.is_nan() => Err(TimestampError::Missing),
        Cell::Float(f) if !f.is_finite() => Err(TimestampError::NotFinite(*f)),
        Cell::Float(f) => Ok(*f),
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(TimestampError::Missing);
            }
            let bad = || TimestampError::BadFormat(s.to_string());
            let (clock, fraction) = s.split_once('.').ok_or_else(bad)?;
            if fraction.is_empty()
                || fraction.len() > MAX_FRACTION_DIGITS
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(bad());
            }
            let t = NaiveTime::parse_from_str(clock, TIMESTAMP_FORMAT).map_err(|_| bad())?;
            let micros: u32 = format!("{fraction:0<6}").parse().map_err(|_| bad())?;
            Ok(f64::from(t.num_seconds_from_midnight()) + f64::from(micros) / 1e6)
        }
    }
}

// ---

fn rt_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"RT-(\d+)").expect("valid RT pattern"))
}

fn sa_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SA-(\d+)").expect("valid SA pattern"))
}

/// Pull `(rt, sa)` out of decoded-info text.
///
/// Only the literal forms `RT-<digits>` and `SA-<digits>` are recognized;
/// both must be present.
pub fn extract_rt_sa(decoded_info: &str) -> Option<(u32, u32)> {
    // ---
    let rt = rt_pattern().captures(decoded_info)?.get(1)?.as_str().parse().ok()?;
    let sa = sa_pattern().captures(decoded_info)?.get(1)?.as_str().parse().ok()?;
    Some((rt, sa))
}

/// `RT{rt}_SA{sa}`, or the positional fallback `MSG_{row_index}`.
pub fn stream_id(decoded_info: &str, row_index: usize) -> String {
    // ---
    match extract_rt_sa(decoded_info) {
        Some((rt, sa)) => format!("RT{rt}_SA{sa}"),
        None => format!("MSG_{row_index}"),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::AnalysisMode;
    use crate::schema::resolve_columns;

    fn timing_table(rows: &[(&str, &str)]) -> RawTable {
        // ---
        let mut t = RawTable::new(vec!["Timestamp".into(), "Decoded Info".into()]);
        for (ts, info) in rows {
            t.push_row([("Timestamp", Cell::text(*ts)), ("Decoded Info", Cell::text(*info))]);
        }
        t
    }

    #[test]
    fn test_parse_timestamp_fixed_format() {
        // ---
        let s = parse_timestamp(&Cell::text("01:02:03.250000")).unwrap();
        assert!((s - 3723.25).abs() < 1e-9);
        assert_eq!(parse_timestamp(&Cell::Float(12.5)), Ok(12.5));
        assert_eq!(parse_timestamp(&Cell::Int(7)), Ok(7.0));

        // shorter fractions are padded, not rejected
        let s = parse_timestamp(&Cell::text("10:00:00.5")).unwrap();
        assert!((s - 36000.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_requires_short_fraction() {
        // ---
        for text in ["10:00:00", "10:00:00.", "10:00:00.1234567", "10:00:00.12a"] {
            assert!(
                matches!(
                    parse_timestamp(&Cell::text(text)),
                    Err(TimestampError::BadFormat(_))
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        // ---
        assert!(matches!(
            parse_timestamp(&Cell::text("2025-01-01T12:00:00Z")),
            Err(TimestampError::BadFormat(_))
        ));
        assert!(matches!(
            parse_timestamp(&Cell::text("12h00")),
            Err(TimestampError::BadFormat(_))
        ));
        assert_eq!(parse_timestamp(&Cell::text("  ")), Err(TimestampError::Missing));
        assert_eq!(parse_timestamp(&Cell::Null), Err(TimestampError::Missing));
    }

    #[test]
    fn test_extract_rt_sa() {
        // ---
        assert_eq!(extract_rt_sa("BC->RT-5 SA-12 RX 4 words"), Some((5, 12)));
        assert_eq!(extract_rt_sa("SA-3 from RT-10"), Some((10, 3)));
        assert_eq!(extract_rt_sa("RT-5 only"), None);
        assert_eq!(extract_rt_sa("rt-5 sa-3"), None);
        assert_eq!(extract_rt_sa(""), None);
    }

    #[test]
    fn test_stream_id_fallback_is_positional() {
        // ---
        assert_eq!(stream_id("RT-1 SA-2", 9), "RT1_SA2");
        assert_eq!(stream_id("Mode code", 9), "MSG_9");
        assert_ne!(stream_id("garbled", 1), stream_id("garbled", 2));
    }

    #[test]
    fn test_normalize_rebases_sorts_and_drops() {
        // ---
        let table = timing_table(&[
            ("10:00:00.300000", "RT-1 SA-1"),
            ("10:00:00.100000", "RT-1 SA-1"),
            ("not a time", "RT-1 SA-1"),
            ("10:00:00.200000", "status"),
        ]);
        let layout = resolve_columns(&table, AnalysisMode::Timing).unwrap();
        let batch = normalize(&table, &layout);

        assert_eq!(batch.total_rows, 4);
        assert_eq!(batch.dropped_rows, 1);
        assert_eq!(batch.records.len(), 3);

        let times: Vec<f64> = batch.records.iter().map(|r| r.relative_time).collect();
        assert_eq!(times[0], 0.0);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!((times[2] - 0.2).abs() < 1e-9);

        assert_eq!(batch.records[0].row_index, 1);
        assert_eq!(batch.records[1].stream_id, "MSG_3");
        assert_eq!(batch.records[2].stream_id, "RT1_SA1");
    }

    #[test]
    fn test_normalize_empty_table() {
        // ---
        let table = timing_table(&[]);
        let layout = resolve_columns(&table, AnalysisMode::Timing).unwrap();
        let batch = normalize(&table, &layout);
        assert!(batch.records.is_empty());
        assert_eq!(batch.dropped_rows, 0);
    }
}
