//! Column type inference over a materialised [`RowSet`].
//!
//! Classification is all-or-nothing per column: a type is chosen only when
//! every non-empty value in the column supports it. Checks run in order
//! date-time, then numeric, then text. A single pass over the whole row set
//! collects a [`ColumnProfile`] per column, which also carries the length and
//! null statistics the reconciler needs when widening an existing table.

use std::fmt;

use serde::Serialize;

use crate::{
    data::{parse_datetime_literal, parse_decimal_literal, parse_integer_literal},
    rows::RowSet,
    sql::{ColumnDefinition, SchemaStatement, TextCapacity},
};

pub const DEFAULT_NARROW_INTEGER_MAX_LEN: usize = 9;
pub const DEFAULT_DATETIME_MAX_LEN: usize = 30;
pub const DEFAULT_TEXT_WIDTH: usize = 255;
pub const DECIMAL_SQL_TYPE: &str = "DECIMAL(18,2)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InferenceOptions {
    /// Widest integer literal (in characters, sign included) stored as `INT`.
    pub narrow_integer_max_len: usize,
    /// Longest value still considered a date-time.
    pub datetime_max_len: usize,
    /// Width given to columns with no non-empty values.
    pub default_text_width: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            narrow_integer_max_len: DEFAULT_NARROW_INTEGER_MAX_LEN,
            datetime_max_len: DEFAULT_DATETIME_MAX_LEN,
            default_text_width: DEFAULT_TEXT_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntegerWidth {
    Narrow,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferredType {
    Text { max_len: usize },
    Integer { width: IntegerWidth },
    Decimal,
    DateTime,
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Text { max_len } => write!(f, "text({max_len})"),
            InferredType::Integer {
                width: IntegerWidth::Narrow,
            } => f.write_str("integer"),
            InferredType::Integer {
                width: IntegerWidth::Wide,
            } => f.write_str("big integer"),
            InferredType::Decimal => f.write_str("decimal"),
            InferredType::DateTime => f.write_str("datetime"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub ordinal: usize,
    pub inferred: InferredType,
    /// Longest non-empty value in characters.
    pub max_chars: usize,
    /// Longest non-empty value in UTF-8 bytes.
    pub max_bytes: usize,
    pub null_count: usize,
    pub non_empty: usize,
}

impl ColumnProfile {
    pub fn has_nulls(&self) -> bool {
        self.null_count > 0
    }

    /// MySQL column type for a freshly created table.
    pub fn sql_type(&self) -> String {
        match self.inferred {
            InferredType::Text { max_len } => {
                TextCapacity::for_lengths(max_len, self.max_bytes.max(max_len)).to_string()
            }
            InferredType::Integer {
                width: IntegerWidth::Narrow,
            } => "INT".to_string(),
            InferredType::Integer {
                width: IntegerWidth::Wide,
            } => "BIGINT".to_string(),
            InferredType::Decimal => DECIMAL_SQL_TYPE.to_string(),
            InferredType::DateTime => "DATETIME".to_string(),
        }
    }

    /// Inferred columns are always created nullable.
    pub fn definition(&self) -> ColumnDefinition {
        ColumnDefinition::new(self.name.clone(), self.sql_type(), true)
    }
}

/// Ordered per-column inference result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferredSchema {
    columns: Vec<ColumnProfile>,
}

impl InferredSchema {
    pub fn columns(&self) -> &[ColumnProfile] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|profile| profile.name.eq_ignore_ascii_case(name))
    }

    pub fn create_statement(&self, table: &str) -> SchemaStatement {
        SchemaStatement::CreateTable {
            table: table.to_string(),
            columns: self.columns.iter().map(ColumnProfile::definition).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct ColumnObservation {
    non_empty: usize,
    nulls: usize,
    max_chars: usize,
    max_bytes: usize,
    all_numeric: bool,
    /// Every value fits a signed 64-bit integer.
    all_integer: bool,
    has_decimal_point: bool,
    all_datetime: bool,
}

impl ColumnObservation {
    fn new() -> Self {
        Self {
            non_empty: 0,
            nulls: 0,
            max_chars: 0,
            max_bytes: 0,
            all_numeric: true,
            all_integer: true,
            has_decimal_point: false,
            all_datetime: true,
        }
    }

    fn update(&mut self, value: Option<&str>) {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            self.nulls += 1;
            return;
        };
        self.non_empty += 1;
        self.max_chars = self.max_chars.max(value.chars().count());
        self.max_bytes = self.max_bytes.max(value.len());

        if self.all_numeric {
            self.all_numeric = parse_decimal_literal(value).is_some();
            if self.all_numeric && value.contains('.') {
                self.has_decimal_point = true;
            }
        }
        if self.all_integer {
            self.all_integer = parse_integer_literal(value).is_some();
        }
        if self.all_datetime {
            self.all_datetime = parse_datetime_literal(value).is_some();
        }
    }

    fn decide(&self, options: &InferenceOptions) -> InferredType {
        if self.non_empty == 0 {
            InferredType::Text {
                max_len: options.default_text_width,
            }
        } else if self.all_datetime && self.max_chars <= options.datetime_max_len {
            InferredType::DateTime
        } else if self.all_numeric && self.has_decimal_point {
            InferredType::Decimal
        } else if self.all_numeric && self.all_integer {
            let width = if self.max_chars <= options.narrow_integer_max_len {
                IntegerWidth::Narrow
            } else {
                IntegerWidth::Wide
            };
            InferredType::Integer { width }
        } else {
            InferredType::Text {
                max_len: self.max_chars.max(1),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaInferencer {
    options: InferenceOptions,
}

impl SchemaInferencer {
    pub fn new(options: InferenceOptions) -> Self {
        Self { options }
    }

    pub fn infer(&self, rows: &RowSet) -> InferredSchema {
        let mut observations = vec![ColumnObservation::new(); rows.columns().len()];
        for row in rows.rows() {
            for (observation, cell) in observations.iter_mut().zip(row.iter()) {
                observation.update(cell.as_deref());
            }
        }
        let columns = rows
            .columns()
            .iter()
            .zip(observations)
            .map(|(column, observation)| ColumnProfile {
                name: column.name.clone(),
                ordinal: column.ordinal,
                inferred: observation.decide(&self.options),
                max_chars: observation.max_chars,
                max_bytes: observation.max_bytes,
                null_count: observation.nulls,
                non_empty: observation.non_empty,
            })
            .collect();
        InferredSchema { columns }
    }
}

/// Infers with the default thresholds.
pub fn infer(rows: &RowSet) -> InferredSchema {
    SchemaInferencer::default().infer(rows)
}
