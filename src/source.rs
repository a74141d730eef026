//! Two-phase source protocol shared by the delimited and workbook readers.
//!
//! A [`TabularSource`] can be traversed any number of times from the start:
//! once by [`TabularSource::count_rows`] to size progress reporting, and once
//! by [`TabularSource::scan_rows`] to decode. Each pass reopens the
//! underlying file.

use crate::{cell::RawCell, error::ImportResult};

/// One physical row as stored, possibly sparse.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based row number in the source (header included).
    pub number: usize,
    /// `(0-based column, cell)` pairs in ascending column order.
    pub cells: Vec<(usize, RawCell)>,
}

impl SourceRow {
    pub fn dense(number: usize, values: impl IntoIterator<Item = RawCell>) -> Self {
        Self {
            number,
            cells: values.into_iter().enumerate().collect(),
        }
    }

    /// One past the highest populated column index.
    pub fn width(&self) -> usize {
        self.cells.last().map(|(col, _)| col + 1).unwrap_or(0)
    }
}

/// Visitor verdict for [`TabularSource::scan_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlow {
    Continue,
    Stop,
}

pub trait TabularSource {
    /// Short human-readable description used in log lines.
    fn describe(&self) -> String;

    /// Counting pass: total physical rows, header included.
    fn count_rows(&mut self) -> ImportResult<usize>;

    /// Decoding pass: feeds every row, in order, to `visit` until it returns
    /// [`RowFlow::Stop`] or the source is exhausted.
    fn scan_rows(
        &mut self,
        visit: &mut dyn FnMut(SourceRow) -> ImportResult<RowFlow>,
    ) -> ImportResult<()>;
}

/// A source over rows already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<SourceRow>,
}

impl MemorySource {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self { rows }
    }

    /// Dense text rows, the first being the header.
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                SourceRow::dense(
                    idx + 1,
                    row.into_iter().map(|value| RawCell::Text(value.into())),
                )
            })
            .collect();
        Self { rows }
    }
}

impl TabularSource for MemorySource {
    fn describe(&self) -> String {
        format!("in-memory source ({} rows)", self.rows.len())
    }

    fn count_rows(&mut self) -> ImportResult<usize> {
        Ok(self.rows.len())
    }

    fn scan_rows(
        &mut self,
        visit: &mut dyn FnMut(SourceRow) -> ImportResult<RowFlow>,
    ) -> ImportResult<()> {
        for row in &self.rows {
            if visit(row.clone())? == RowFlow::Stop {
                break;
            }
        }
        Ok(())
    }
}
