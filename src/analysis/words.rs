//! Word-level passes of the deviation analyzer: status, command and data words.
//!
//! Each pass walks a stream's records once, decodes the relevant cells via
//! [`crate::decoder`], and returns a sub-report whose anomalies are later
//! merged into the stream's deviation result. Absent or malformed words are
//! counted separately and never enter the statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::decoder::{
    classify_status, command_word_violations, decode_command_word, decode_opt, decode_status_word,
    decode_word, WordValue,
};
use crate::models::{Anomaly, AnomalyType, NormalizedRecord, Severity};

// ---

/// Occurrences of each status bit across a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBitStatistics {
    pub message_error: usize,
    pub instrumentation: usize,
    pub service_request: usize,
    pub broadcast_received: usize,
    pub busy: usize,
    pub subsystem_flag: usize,
    pub dynamic_bus_control: usize,
    pub terminal_flag: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusWordReport {
    // ---
    pub total_status_words: usize,
    pub absent_words: usize,
    pub malformed_words: usize,
    pub normal_operations: usize,
    pub errors: Vec<Anomaly>,
    pub warnings: Vec<Anomaly>,
    pub bit_statistics: StatusBitStatistics,
}

/// Classify every status word in the stream.
///
/// Bit counters are updated for every decoded word; classification takes
/// the first match of message error, busy, service request.
pub fn analyze_status_words(records: &[&NormalizedRecord]) -> StatusWordReport {
    // ---
    let mut report = StatusWordReport::default();

    for (i, r) in records.iter().enumerate() {
        let value = match decode_opt(r.record.status_word.as_ref()) {
            WordValue::Present(v) => v,
            WordValue::Absent => {
                report.absent_words += 1;
                continue;
            }
            WordValue::Malformed(_) => {
                report.malformed_words += 1;
                continue;
            }
        };

        report.total_status_words += 1;
        let sw = decode_status_word(value);

        let bits = &mut report.bit_statistics;
        bits.message_error += usize::from(sw.message_error);
        bits.instrumentation += usize::from(sw.instrumentation);
        bits.service_request += usize::from(sw.service_request);
        bits.broadcast_received += usize::from(sw.broadcast_received);
        bits.busy += usize::from(sw.busy);
        bits.subsystem_flag += usize::from(sw.subsystem_flag);
        bits.dynamic_bus_control += usize::from(sw.dynamic_bus_control);
        bits.terminal_flag += usize::from(sw.terminal_flag);

        match classify_status(&sw).finding() {
            Some((kind, severity, text)) => {
                let a = Anomaly::new(kind, severity, format!("{text} (SW=0x{value:04X})"))
                    .at_time(r.relative_time)
                    .at_occurrence(i);
                if kind == AnomalyType::StatusError {
                    report.errors.push(a);
                } else {
                    report.warnings.push(a);
                }
            }
            None => report.normal_operations += 1,
        }
    }

    report
}

// ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandWordReport {
    // ---
    pub total_command_words: usize,
    pub malformed_words: usize,
    pub transmit_commands: usize,
    pub receive_commands: usize,
    pub mode_commands: usize,
    pub rt_addresses: BTreeSet<u8>,
    pub subaddresses: BTreeSet<u8>,
    pub violations: Vec<Anomaly>,
}

/// Decode and validate CW1 and, when present, CW2 of every record.
pub fn analyze_command_words(records: &[&NormalizedRecord]) -> CommandWordReport {
    // ---
    let mut report = CommandWordReport::default();

    for (i, r) in records.iter().enumerate() {
        let words = [
            ("CW1", r.record.command_word_1.as_ref()),
            ("CW2", r.record.command_word_2.as_ref()),
        ];
        for (label, cell) in words {
            let value = match decode_opt(cell) {
                WordValue::Present(v) => v,
                WordValue::Absent => continue,
                WordValue::Malformed(_) => {
                    report.malformed_words += 1;
                    continue;
                }
            };

            report.total_command_words += 1;
            let cw = decode_command_word(value);

            if cw.is_mode_command {
                report.mode_commands += 1;
            } else if cw.transmit_flag {
                report.transmit_commands += 1;
            } else {
                report.receive_commands += 1;
            }
            report.rt_addresses.insert(cw.rt_address);
            report.subaddresses.insert(cw.subaddress);

            report.violations.extend(
                command_word_violations(&cw, label)
                    .into_iter()
                    .map(|a| a.at_time(r.relative_time).at_occurrence(i)),
            );
        }
    }

    report
}

// ---

/// How often one data word value occurs across the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: usize,
    pub share: f64,
}

/// Present-value count of one data word column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUsage {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataWordReport {
    // ---
    pub total_data_words: usize,
    pub missing_words: usize,
    pub unique_values: usize,
    pub most_common: Option<ValueFrequency>,
    pub column_usage: Vec<ColumnUsage>,
    pub anomalies: Vec<Anomaly>,
}

/// Pattern analysis over all data words of a stream.
///
/// `columns` names the data word columns in the order records carry them.
pub fn analyze_data_words(
    records: &[&NormalizedRecord],
    columns: &[String],
    cfg: &AnalysisConfig,
) -> DataWordReport {
    // ---
    let mut report = DataWordReport::default();
    let mut frequency: BTreeMap<u32, usize> = BTreeMap::new();
    let mut usage = vec![0usize; columns.len()];

    for (i, r) in records.iter().enumerate() {
        let words = &r.record.data_words;
        let expected = expected_word_count(r, words.len());

        let mut missing = 0;
        let mut zeros = 0;
        for (col, cell) in words.iter().enumerate() {
            let value = decode_word(cell).value();
            if let Some(v) = value {
                *frequency.entry(v).or_default() += 1;
                if let Some(n) = usage.get_mut(col) {
                    *n += 1;
                }
                report.total_data_words += 1;
            }
            if col < expected {
                match value {
                    None => missing += 1,
                    Some(0) => zeros += 1,
                    Some(_) => {}
                }
            }
        }

        report.missing_words += missing;
        if missing > 0 {
            let severity = if missing < cfg.missing_words_high {
                Severity::Moderate
            } else {
                Severity::High
            };
            report.anomalies.push(
                Anomaly::new(
                    AnomalyType::MissingDataWords,
                    severity,
                    format!("{missing} of {expected} expected data words missing"),
                )
                .at_time(r.relative_time)
                .at_occurrence(i),
            );
        }
        if expected > 0 && zeros as f64 / expected as f64 > cfg.zero_concentration_ratio {
            report.anomalies.push(
                Anomaly::new(
                    AnomalyType::ZeroConcentration,
                    Severity::Low,
                    format!("suspicious zero concentration: {zeros} of {expected} data words are zero"),
                )
                .at_time(r.relative_time)
                .at_occurrence(i),
            );
        }
    }

    report.unique_values = frequency.len();
    report.anomalies.extend(pattern_anomalies(&frequency, report.total_data_words, cfg));

    if let Some((value, count)) = frequency
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
    {
        report.most_common = Some(ValueFrequency {
            value: hex(*value),
            count: *count,
            share: *count as f64 / report.total_data_words as f64,
        });
    }

    report.anomalies.extend(rare_column_anomalies(columns, &usage, cfg));
    report.column_usage = columns
        .iter()
        .zip(&usage)
        .filter(|(_, n)| **n > 0)
        .map(|(c, n)| ColumnUsage {
            column: c.clone(),
            count: *n,
        })
        .collect();

    report
}

/// Data words the record's own command word says it carries, capped at the
/// number of data word columns. Without a usable CW1 every column is expected.
fn expected_word_count(r: &NormalizedRecord, available: usize) -> usize {
    // ---
    match decode_opt(r.record.command_word_1.as_ref()) {
        WordValue::Present(v) => decode_command_word(v).data_word_count().min(available),
        _ => available,
    }
}

fn pattern_anomalies(
    frequency: &BTreeMap<u32, usize>,
    total: usize,
    cfg: &AnalysisConfig,
) -> Vec<Anomaly> {
    // ---
    if total == 0 {
        return Vec::new();
    }
    frequency
        .iter()
        .filter_map(|(value, count)| {
            let share = *count as f64 / total as f64;
            let pct = share * 100.0;
            if share > cfg.stuck_value_ratio {
                Some(Anomaly::new(
                    AnomalyType::StuckBits,
                    Severity::High,
                    format!("value {} in {pct:.1}% of data words: potential stuck bits", hex(*value)),
                ))
            } else if share > cfg.repeated_value_ratio {
                Some(Anomaly::new(
                    AnomalyType::RepeatedPattern,
                    Severity::Moderate,
                    format!("value {} in {pct:.1}% of data words: repeated pattern", hex(*value)),
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Columns that carried data but far less often than the busiest column.
fn rare_column_anomalies(columns: &[String], usage: &[usize], cfg: &AnalysisConfig) -> Vec<Anomaly> {
    // ---
    let busiest = usage.iter().copied().max().unwrap_or(0);
    if busiest == 0 {
        return Vec::new();
    }
    let floor = busiest as f64 * cfg.rare_column_ratio;

    columns
        .iter()
        .zip(usage)
        .filter(|(_, n)| **n > 0 && (**n as f64) < floor)
        .map(|(c, n)| {
            Anomaly::new(
                AnomalyType::RarelyUsedColumn,
                Severity::Low,
                format!("{c} rarely used ({n} of {busiest} in the busiest column)"),
            )
        })
        .collect()
}

fn hex(value: u32) -> String {
    format!("0x{value:04X}")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Cell, LogRecord};

    fn rec(t: f64, cw1: Option<Cell>, sw: Option<Cell>, dws: Vec<Cell>) -> NormalizedRecord {
        // ---
        NormalizedRecord {
            record: LogRecord {
                timestamp: Cell::Float(t),
                decoded_info: "RT-1 SA-1".into(),
                command_word_1: cw1,
                command_word_2: None,
                status_word: sw,
                data_words: dws,
            },
            row_index: 0,
            relative_time: t,
            stream_id: "RT1_SA1".into(),
        }
    }

    fn cols(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("DW{i}")).collect()
    }

    /// RT 1, receive, SA 1, `n` words.
    fn cw(n: u32) -> Option<Cell> {
        Some(Cell::Int(i64::from((1 << 11) | (1 << 5) | (n & 0x1F))))
    }

    #[test]
    fn test_status_classification_and_bits() {
        // ---
        let records = vec![
            rec(0.0, None, Some(Cell::text("0x0400")), vec![]),
            rec(0.1, None, Some(Cell::text("0x0108")), vec![]),
            rec(0.2, None, Some(Cell::text("0x0100")), vec![]),
            rec(0.3, None, Some(Cell::Int(0)), vec![]),
            rec(0.4, None, Some(Cell::text("")), vec![]),
            rec(0.5, None, Some(Cell::text("bogus")), vec![]),
        ];
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_status_words(&refs);

        assert_eq!(report.total_status_words, 4);
        assert_eq!(report.absent_words, 1);
        assert_eq!(report.malformed_words, 1);
        assert_eq!(report.normal_operations, 1);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].severity, Severity::Critical);
        assert!(report.errors[0].description.starts_with("Message Error detected"));
        assert_eq!(report.errors[0].occurrence, Some(0));

        // busy wins over service request, but both bits are counted
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0].severity, Severity::Moderate);
        assert_eq!(report.warnings[1].severity, Severity::Low);
        assert_eq!(report.bit_statistics.busy, 1);
        assert_eq!(report.bit_statistics.service_request, 2);
        assert_eq!(report.bit_statistics.message_error, 1);
    }

    #[test]
    fn test_command_word_counts() {
        // ---
        let transmit = (2 << 11) | (1 << 10) | (4 << 5) | 2;
        let receive = (3 << 11) | (5 << 5) | 2;
        let mode = (3 << 11) | (31 << 5) | 17;
        let bad_broadcast = (31 << 11) | (1 << 10) | (4 << 5) | 1;

        let mut r1 = rec(0.0, Some(Cell::Int(transmit)), None, vec![]);
        r1.record.command_word_2 = Some(Cell::Int(receive));
        let r2 = rec(0.1, Some(Cell::Int(mode)), None, vec![]);
        let r3 = rec(0.2, Some(Cell::Int(bad_broadcast)), None, vec![]);
        let r4 = rec(0.3, Some(Cell::text("zz")), None, vec![]);
        let records = [r1, r2, r3, r4];
        let refs: Vec<_> = records.iter().collect();

        let report = analyze_command_words(&refs);
        assert_eq!(report.total_command_words, 4);
        assert_eq!(report.malformed_words, 1);
        assert_eq!(report.transmit_commands, 2);
        assert_eq!(report.receive_commands, 1);
        assert_eq!(report.mode_commands, 1);
        assert_eq!(report.rt_addresses, BTreeSet::from([2, 3, 31]));
        assert_eq!(report.subaddresses, BTreeSet::from([4, 5, 31]));
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].occurrence, Some(2));
        assert_eq!(report.violations[0].severity, Severity::High);
    }

    #[test]
    fn test_half_share_is_only_a_repeated_pattern() {
        // ---
        let cfg = AnalysisConfig::default();
        let records: Vec<_> = (0..4)
            .map(|k| {
                rec(
                    k as f64 * 0.1,
                    cw(2),
                    None,
                    vec![Cell::text("0xAAAA"), Cell::Int(k)],
                )
            })
            .collect();
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(2), &cfg);

        assert_eq!(report.total_data_words, 8);
        let stuck: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyType::StuckBits)
            .collect();
        // 0xAAAA is 4 of 8 words: exactly 50% is not stuck
        assert!(stuck.is_empty());
        let most = report.most_common.unwrap();
        assert_eq!(most.value, "0xAAAA");
        assert_eq!(most.count, 4);

        let repeated: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyType::RepeatedPattern)
            .collect();
        assert_eq!(repeated.len(), 1);
        assert_eq!(repeated[0].severity, Severity::Moderate);
    }

    #[test]
    fn test_dominant_value_flags_stuck_bits() {
        // ---
        let cfg = AnalysisConfig::default();
        let records: Vec<_> = (0..3)
            .map(|k| rec(k as f64, cw(3), None, vec![Cell::Int(7), Cell::Int(7), Cell::Int(k)]))
            .collect();
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(3), &cfg);

        // 7 appears 6 of 9 times
        let stuck: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyType::StuckBits)
            .collect();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].severity, Severity::High);
        assert!(stuck[0].description.contains("0x0007"));
    }

    #[test]
    fn test_missing_words_severity() {
        // ---
        let cfg = AnalysisConfig::default();
        let blanks = |n: usize| -> Vec<Cell> {
            let mut v: Vec<Cell> = (1..=8).map(Cell::Int).collect();
            for c in v.iter_mut().take(n) {
                *c = Cell::Null;
            }
            v
        };
        let records = vec![
            rec(0.0, cw(8), None, blanks(2)),
            rec(0.1, cw(8), None, blanks(5)),
            rec(0.2, cw(8), None, blanks(0)),
        ];
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(8), &cfg);

        let missing: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyType::MissingDataWords)
            .collect();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].severity, Severity::Moderate);
        assert_eq!(missing[0].occurrence, Some(0));
        assert_eq!(missing[1].severity, Severity::High);
        assert_eq!(report.missing_words, 7);
    }

    #[test]
    fn test_expected_count_follows_command_word() {
        // ---
        let cfg = AnalysisConfig::default();
        // two-word message in a table with four data word columns
        let records = vec![rec(
            0.0,
            cw(2),
            None,
            vec![Cell::Int(1), Cell::Int(2), Cell::Null, Cell::Null],
        )];
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(4), &cfg);

        assert_eq!(report.missing_words, 0);
        assert!(report
            .anomalies
            .iter()
            .all(|a| a.kind != AnomalyType::MissingDataWords));
    }

    #[test]
    fn test_zero_concentration() {
        // ---
        let cfg = AnalysisConfig::default();
        let mut words = vec![Cell::Int(0); 10];
        words[0] = Cell::Int(5);
        let records = vec![rec(0.0, cw(10), None, words)];
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(10), &cfg);

        // 9 of 10 zero is above 80%
        assert!(report
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyType::ZeroConcentration && a.severity == Severity::Low));
    }

    #[test]
    fn test_zero_concentration_at_cutoff_is_not_flagged() {
        // ---
        let cfg = AnalysisConfig::default();
        let mut words = vec![Cell::Int(0); 10];
        words[0] = Cell::Int(5);
        words[1] = Cell::Int(6);
        let records = vec![rec(0.0, cw(10), None, words)];
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(10), &cfg);

        // exactly 80% zero must be strictly exceeded
        assert!(!report
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyType::ZeroConcentration));
    }

    #[test]
    fn test_rarely_used_column() {
        // ---
        let cfg = AnalysisConfig::default();
        let mut records: Vec<_> = (0..20)
            .map(|k| rec(k as f64, None, None, vec![Cell::Int(k), Cell::Null]))
            .collect();
        records[0].record.data_words[1] = Cell::Int(99);
        let refs: Vec<_> = records.iter().collect();
        let report = analyze_data_words(&refs, &cols(2), &cfg);

        let rare: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyType::RarelyUsedColumn)
            .collect();
        assert_eq!(rare.len(), 1);
        assert!(rare[0].description.starts_with("DW2"));
        assert_eq!(report.column_usage.len(), 2);
        assert_eq!(report.column_usage[1].count, 1);
    }
}
