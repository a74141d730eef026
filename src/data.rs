//! Literal parsing and per-cell coercion into bind parameters.
//!
//! The row set only holds strings. Right before insertion each cell is
//! converted into a [`SqlValue`] according to the destination column's
//! declared type. Unparseable values become NULL with a warning rather than
//! failing the row; the only hard per-row failure here is a NULL headed for a
//! NOT NULL column.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::{
    db::{LiveSchema, SqlValue},
    error::{ImportError, ImportResult, RowError},
    rows::ColumnDescriptor,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// Parses a date or date-time literal; bare dates land on midnight.
pub fn parse_datetime_literal(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    parse_naive_datetime(trimmed).or_else(|| {
        parse_naive_date(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Plain decimal literal. Digit separators (`1_000`) are not numbers here.
pub fn parse_decimal_literal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.contains('_') {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

pub fn parse_integer_literal(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// How a destination column wants its cells bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Decimal,
    Integer,
    DateTime,
    Time,
    Text,
}

impl ColumnKind {
    /// Classifies a live column type such as `decimal(18,2)` or `bigint unsigned`.
    pub fn from_sql_type(sql_type: &str) -> Self {
        let upper = sql_type.trim().to_ascii_uppercase();
        let base = upper
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        if matches!(base, "DECIMAL" | "NUMERIC" | "DEC" | "FIXED" | "REAL")
            || upper.contains("DOUBLE")
            || upper.contains("FLOAT")
        {
            ColumnKind::Decimal
        } else if upper.contains("INT") || base == "YEAR" {
            ColumnKind::Integer
        } else if base == "TIME" {
            ColumnKind::Time
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Decimal => "number",
            ColumnKind::Integer => "integer",
            ColumnKind::DateTime => "date",
            ColumnKind::Time => "time",
            ColumnKind::Text => "text",
        };
        f.write_str(label)
    }
}

/// Converts one non-blank cell; `None` when the literal does not fit `kind`.
pub fn coerce_value(value: &str, kind: ColumnKind) -> Option<SqlValue> {
    match kind {
        ColumnKind::Decimal => parse_decimal_literal(value).map(SqlValue::Decimal),
        ColumnKind::Integer => parse_integer_literal(value).map(SqlValue::Integer),
        ColumnKind::DateTime => parse_datetime_literal(value).map(SqlValue::DateTime),
        ColumnKind::Time => parse_naive_time(value.trim())
            .or_else(|| parse_datetime_literal(value).map(|dt| dt.time()))
            .map(SqlValue::Time),
        ColumnKind::Text => Some(SqlValue::Text(value.to_string())),
    }
}

#[derive(Debug, Clone)]
struct CoercionTarget {
    name: String,
    kind: ColumnKind,
    nullable: bool,
}

/// A row ready to bind, plus the cells that were nulled on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedRow {
    pub values: Vec<SqlValue>,
    pub warnings: Vec<String>,
}

/// Per-column coercion rules resolved once against the live schema.
#[derive(Debug, Clone)]
pub struct RowCoercer {
    targets: Vec<CoercionTarget>,
}

impl RowCoercer {
    pub fn new(columns: &[ColumnDescriptor], live: &LiveSchema) -> ImportResult<Self> {
        let targets = columns
            .iter()
            .map(|column| {
                let live_column = live.get(&column.name).ok_or_else(|| {
                    ImportError::schema_mismatch(format!(
                        "column '{}' does not exist in the destination table",
                        column.name
                    ))
                })?;
                Ok(CoercionTarget {
                    name: column.name.clone(),
                    kind: ColumnKind::from_sql_type(&live_column.sql_type),
                    nullable: live_column.nullable,
                })
            })
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self { targets })
    }

    pub fn kinds(&self) -> Vec<ColumnKind> {
        self.targets.iter().map(|target| target.kind).collect()
    }

    /// Coerces `row` (1-based data row `row_number`) into bind values.
    pub fn coerce(&self, row_number: usize, row: &[Option<String>]) -> Result<CoercedRow, RowError> {
        let mut values = Vec::with_capacity(self.targets.len());
        let mut warnings = Vec::new();
        for (idx, target) in self.targets.iter().enumerate() {
            let cell = row
                .get(idx)
                .and_then(|cell| cell.as_deref())
                .filter(|value| !value.trim().is_empty());
            let value = match cell {
                None => SqlValue::Null,
                Some(text) => match coerce_value(text, target.kind) {
                    Some(value) => value,
                    None => {
                        warnings.push(format!(
                            "row {row_number} column '{}': value '{text}' is not a valid {}; stored NULL",
                            target.name, target.kind
                        ));
                        SqlValue::Null
                    }
                },
            };
            if value.is_null() && !target.nullable {
                return Err(RowError::in_column(
                    row_number,
                    &target.name,
                    "NULL value for a NOT NULL column",
                ));
            }
            values.push(value);
        }
        Ok(CoercedRow { values, warnings })
    }
}
