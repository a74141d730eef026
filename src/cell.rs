//! Canonical text decoding for stored spreadsheet cells.
//!
//! Every cell read from a workbook passes through [`CellDecoder::decode`]
//! before trimming or type inference sees it, so that `42.0` and `4.2E+1`
//! land in the row set as the same string.

use std::str::FromStr;

use calamine::DataRef;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

const DATETIME_RENDER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A cell as stored by the source, before canonicalisation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    /// Inline or shared string text, already resolved against the string table.
    Text(String),
    /// Numeric literal exactly as stored.
    Number(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Error literal such as `#DIV/0!`.
    Error(String),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }
}

impl From<&DataRef<'_>> for RawCell {
    fn from(value: &DataRef<'_>) -> Self {
        #[allow(unreachable_patterns)]
        match value {
            DataRef::Empty => RawCell::Empty,
            DataRef::String(s) => RawCell::Text(s.clone()),
            DataRef::SharedString(s) => RawCell::Text((*s).to_string()),
            DataRef::Float(f) => RawCell::Number(f.to_string()),
            DataRef::Int(i) => RawCell::Number(i.to_string()),
            DataRef::Bool(b) => RawCell::Bool(*b),
            DataRef::DateTime(dt) => match dt.as_datetime() {
                Some(parsed) => RawCell::DateTime(parsed),
                None => RawCell::Number(dt.as_f64().to_string()),
            },
            DataRef::DateTimeIso(s) | DataRef::DurationIso(s) => RawCell::Text(s.clone()),
            DataRef::Error(e) => RawCell::Error(e.to_string()),
            _ => RawCell::Empty,
        }
    }
}

/// Converts [`RawCell`]s into the canonical strings stored in a row set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellDecoder;

impl CellDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes a stored cell. Never fails: unresolvable content yields `""`.
    pub fn decode(&self, cell: &RawCell) -> String {
        match cell {
            RawCell::Empty => String::new(),
            RawCell::Text(text) => text.clone(),
            RawCell::Number(literal) => normalize_numeric_literal(literal),
            RawCell::Bool(true) => "1".to_string(),
            RawCell::Bool(false) => "0".to_string(),
            RawCell::DateTime(dt) => dt.format(DATETIME_RENDER_FORMAT).to_string(),
            RawCell::Error(literal) => literal.clone(),
        }
    }
}

/// Canonical text for a numeric literal.
///
/// An exact trailing `.0` is stripped; anything else that parses as a decimal
/// (plain or scientific) is re-rendered in plain invariant notation. Text that
/// does not parse is returned unchanged.
pub fn normalize_numeric_literal(literal: &str) -> String {
    if let Some(stripped) = literal.strip_suffix(".0") {
        return stripped.to_string();
    }
    let trimmed = literal.trim();
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed).ok()
    } else {
        Decimal::from_str(trimmed).ok()
    };
    match parsed {
        Some(value) => value.normalize().to_string(),
        None => literal.to_string(),
    }
}
