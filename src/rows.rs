//! In-memory row set and header handling.
//!
//! A [`RowSet`] holds the decoded content of one source: an ordered list of
//! [`ColumnDescriptor`]s and dense rows aligned to them. Every row has exactly
//! one cell per column; `None` is a stored null.

use std::collections::HashMap;

use serde::Serialize;

pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// 0-based position in the header.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a row set from header names and rows, de-duplicating names and
    /// padding or truncating each row to the column count.
    pub fn from_parts<I, S>(headers: I, rows: Vec<Row>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = RowSet::new(build_columns(headers));
        set.extend(rows);
        set
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Appends a buffered chunk of rows.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.push(row);
        }
    }
}

/// Turns raw header names into ordered descriptors.
///
/// The first occurrence of a name keeps it; later repeats become `name_2`,
/// `name_3`, ... (skipping suffixes that are themselves taken).
pub fn build_columns<I, S>(headers: I) -> Vec<ColumnDescriptor>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    for (ordinal, header) in headers.into_iter().enumerate() {
        let base: String = header.into();
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let mut name = if *count == 1 {
            base.clone()
        } else {
            format!("{base}_{count}")
        };
        while columns.iter().any(|c| c.name == name) {
            *count += 1;
            name = format!("{base}_{count}");
        }
        columns.push(ColumnDescriptor { name, ordinal });
    }
    columns
}

/// Name used for a header cell that is blank.
pub fn placeholder_header(ordinal: usize) -> String {
    format!("Column{}", ordinal + 1)
}

/// Maps a header onto the identifier alphabet: ASCII letters, digits, `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Canonical stored form of a decoded cell: blank → null, optionally trimmed.
pub fn normalize_cell(value: &str, trim: bool) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else if trim {
        Some(value.trim().to_string())
    } else {
        Some(value.to_string())
    }
}

pub fn is_blank_row(row: &[Option<String>]) -> bool {
    row.iter()
        .all(|cell| cell.as_deref().is_none_or(|v| v.trim().is_empty()))
}
