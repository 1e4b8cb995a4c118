//! MIL-STD-1553B word decoder.
//!
//! Pure functions only: turning a spreadsheet cell into a word value, and a
//! word value into its command or status fields. Nothing here logs or
//! allocates beyond the returned values.
//!
//! Field layout (bit 15 is the most significant bit):
//!
//! ```text
//! command word: | RT addr 15-11 | T/R 10 | subaddress 9-5 | word count / mode code 4-0 |
//! status word:  | RT addr 15-11 | ME 10 | INS 9 | SR 8 | reserved 7-5 | BCR 4 | BUSY 3 | SF 2 | DBCA 1 | TF 0 |
//! ```

use serde::Serialize;

use crate::error::DecodeError;
use crate::models::{Anomaly, AnomalyType, Cell, Severity};

/// Broadcast RT address (all ones).
pub const BROADCAST_RT: u8 = 31;

/// One bus word is 16 bits wide.
const WORD_MASK: i128 = 0xFFFF;
const WORD_MODULUS: f64 = 65536.0;

const RT_SHIFT: u32 = 11;
const FIVE_BITS: u32 = 0x1F;

const CW_TRANSMIT_BIT: u32 = 1 << 10;
const CW_SA_SHIFT: u32 = 5;

const SW_MESSAGE_ERROR: u32 = 1 << 10;
const SW_INSTRUMENTATION: u32 = 1 << 9;
const SW_SERVICE_REQUEST: u32 = 1 << 8;
const SW_BROADCAST_RECEIVED: u32 = 1 << 4;
const SW_BUSY: u32 = 1 << 3;
const SW_SUBSYSTEM_FLAG: u32 = 1 << 2;
const SW_DYNAMIC_BUS_CONTROL: u32 = 1 << 1;
const SW_TERMINAL_FLAG: u32 = 1;

// ---

/// Result of decoding one word cell.
///
/// `Absent` and `Malformed` are both "no value" for statistics, but they are
/// kept apart so a blank cell is never confused with garbage, and neither is
/// ever confused with a legitimate zero word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordValue {
    Present(u32),
    Absent,
    Malformed(DecodeError),
}

impl WordValue {
    // ---
    pub fn value(&self) -> Option<u32> {
        match self {
            WordValue::Present(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, WordValue::Present(_))
    }
}

/// Decode a cell into a word value.
///
/// Strategies are tried in a fixed order and the first that applies decides:
/// 1. blank cells (null, NaN, or text `""`/`nan`/`null`/`none`) are absent
/// 2. integers are taken as-is
/// 3. floats are truncated toward zero
/// 4. text with a `0x`/`0X` prefix is parsed base 16
/// 5. other integer text is parsed base 10
/// 6. any other text is parsed as a decimal number and truncated
///
/// Every numeric form is reduced to its low 16 bits (two's complement for
/// negatives): captured hardware words may carry extra bits, which are
/// masked, never rejected. Only text that is not a number is malformed.
pub fn decode_word(cell: &Cell) -> WordValue {
    // ---
    match cell {
        Cell::Null => WordValue::Absent,
        Cell::Bool(_) => WordValue::Malformed(DecodeError::UnsupportedType("bool")),
        Cell::Int(i) => WordValue::Present(mask_i128(i128::from(*i))),
        Cell::Float(f) => from_f64(*f, || f.to_string()),
        Cell::Text(s) => decode_text(s),
    }
}

/// Decode an optional cell, treating a missing cell like a blank one.
pub fn decode_opt(cell: Option<&Cell>) -> WordValue {
    cell.map_or(WordValue::Absent, decode_word)
}

fn decode_text(raw: &str) -> WordValue {
    // ---
    let s = raw.trim();
    if is_blank_marker(s) {
        return WordValue::Absent;
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return WordValue::Malformed(DecodeError::Malformed(raw.to_string()));
        }
        // the low 16 bits are the last four hex digits
        let low = &hex[hex.len().saturating_sub(4)..];
        return match u32::from_str_radix(low, 16) {
            Ok(v) => WordValue::Present(v),
            Err(_) => WordValue::Malformed(DecodeError::Malformed(raw.to_string())),
        };
    }

    if let Ok(v) = s.parse::<i128>() {
        return WordValue::Present(mask_i128(v));
    }

    match s.parse::<f64>() {
        Ok(f) => from_f64(f, || raw.to_string()),
        Err(_) => WordValue::Malformed(DecodeError::Malformed(raw.to_string())),
    }
}

fn is_blank_marker(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("none")
}

fn mask_i128(v: i128) -> u32 {
    (v & WORD_MASK) as u32
}

fn from_f64(v: f64, shown: impl Fn() -> String) -> WordValue {
    // ---
    if v.is_nan() {
        return WordValue::Absent;
    }
    if v.is_infinite() {
        return WordValue::Malformed(DecodeError::NotFinite(shown()));
    }
    // rem_euclid keeps negatives in two's complement order: -1.0 -> 0xFFFF
    WordValue::Present(v.trunc().rem_euclid(WORD_MODULUS) as u32)
}

// ---

/// Fields of a command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedCommandWord {
    pub rt_address: u8,
    pub transmit_flag: bool,
    pub subaddress: u8,
    /// Raw 5-bit field: a word count (0 meaning 32) or, for mode commands,
    /// the mode code.
    pub word_count: u8,
    pub is_mode_command: bool,
}

impl DecodedCommandWord {
    /// Number of data words this command moves.
    ///
    /// Mode codes 16..=31 carry one data word, 0..=15 carry none.
    pub fn data_word_count(&self) -> usize {
        // ---
        if self.is_mode_command {
            usize::from(self.word_count >= 16)
        } else if self.word_count == 0 {
            32
        } else {
            usize::from(self.word_count)
        }
    }
}

/// Split a command word into its fields.
pub fn decode_command_word(value: u32) -> DecodedCommandWord {
    // ---
    let subaddress = ((value >> CW_SA_SHIFT) & FIVE_BITS) as u8;
    DecodedCommandWord {
        rt_address: ((value >> RT_SHIFT) & FIVE_BITS) as u8,
        transmit_flag: value & CW_TRANSMIT_BIT != 0,
        subaddress,
        word_count: (value & FIVE_BITS) as u8,
        is_mode_command: subaddress == 0 || subaddress == 31,
    }
}

/// Protocol violations carried by one decoded command word.
///
/// `label` names the column the word came from (e.g. `CW1`).
pub fn command_word_violations(cw: &DecodedCommandWord, label: &str) -> Vec<Anomaly> {
    // ---
    let mut found = Vec::new();

    if cw.rt_address == BROADCAST_RT && cw.transmit_flag {
        found.push(Anomaly::new(
            AnomalyType::CommandWordError,
            Severity::High,
            format!("{label}: invalid broadcast transmit command (RT 31 with transmit bit set)"),
        ));
    }

    if cw.is_mode_command {
        let mode_code = cw.word_count;
        if mode_code > 31 {
            found.push(Anomaly::new(
                AnomalyType::CommandWordError,
                Severity::Moderate,
                format!("{label}: invalid mode code {mode_code}"),
            ));
        }
    } else {
        let words = if cw.word_count == 0 { 32 } else { u32::from(cw.word_count) };
        if words > 32 {
            found.push(Anomaly::new(
                AnomalyType::CommandWordError,
                Severity::High,
                format!("{label}: invalid word count {words}"),
            ));
        }
    }

    found
}

// ---

/// Fields of a status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedStatusWord {
    pub rt_address: u8,
    pub message_error: bool,
    pub instrumentation: bool,
    pub service_request: bool,
    pub broadcast_received: bool,
    pub busy: bool,
    pub subsystem_flag: bool,
    pub dynamic_bus_control: bool,
    pub terminal_flag: bool,
}

/// Split a status word into its fields.
pub fn decode_status_word(value: u32) -> DecodedStatusWord {
    // ---
    DecodedStatusWord {
        rt_address: ((value >> RT_SHIFT) & FIVE_BITS) as u8,
        message_error: value & SW_MESSAGE_ERROR != 0,
        instrumentation: value & SW_INSTRUMENTATION != 0,
        service_request: value & SW_SERVICE_REQUEST != 0,
        broadcast_received: value & SW_BROADCAST_RECEIVED != 0,
        busy: value & SW_BUSY != 0,
        subsystem_flag: value & SW_SUBSYSTEM_FLAG != 0,
        dynamic_bus_control: value & SW_DYNAMIC_BUS_CONTROL != 0,
        terminal_flag: value & SW_TERMINAL_FLAG != 0,
    }
}

/// Outcome of classifying one status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    MessageError,
    Busy,
    ServiceRequest,
    Normal,
}

impl StatusClass {
    /// Severity and description for the non-normal classes.
    pub fn finding(self) -> Option<(AnomalyType, Severity, &'static str)> {
        // ---
        match self {
            StatusClass::MessageError => Some((
                AnomalyType::StatusError,
                Severity::Critical,
                "Message Error detected",
            )),
            StatusClass::Busy => Some((AnomalyType::StatusWarning, Severity::Moderate, "Terminal Busy")),
            StatusClass::ServiceRequest => Some((
                AnomalyType::StatusWarning,
                Severity::Low,
                "Service Request",
            )),
            StatusClass::Normal => None,
        }
    }
}

/// First matching class wins: message error, then busy, then service request.
pub fn classify_status(sw: &DecodedStatusWord) -> StatusClass {
    // ---
    if sw.message_error {
        StatusClass::MessageError
    } else if sw.busy {
        StatusClass::Busy
    } else if sw.service_request {
        StatusClass::ServiceRequest
    } else {
        StatusClass::Normal
    }
}
