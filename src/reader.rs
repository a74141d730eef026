//! Materialises a [`RowSet`] from any [`TabularSource`].
//!
//! Reading is two-phase: a counting pass sizes the progress denominator, then
//! a decoding pass builds the header and dense, null-padded rows. Rows are
//! buffered in fixed-size chunks before being appended to the row set, and
//! the cancellation signal is polled at every row boundary.

use std::path::Path;

use log::debug;

use crate::{
    cell::CellDecoder,
    delimited::DelimitedSource,
    error::{ImportError, ImportResult},
    io_utils::SourceFormat,
    progress::Checkpoint,
    rows::{self, Row, RowSet},
    settings::{ImportSettings, SourceOptions},
    source::{RowFlow, SourceRow, TabularSource},
    spreadsheet::WorkbookSource,
};

/// Rows held back before being appended to the row set.
pub const CHUNK_ROWS: usize = 1_000;
/// Rows between read-phase progress reports and host yields.
pub const READ_REPORT_INTERVAL: usize = 1_000;

/// Opens the right source for `path` based on its extension.
pub fn open_source(path: &Path, options: &SourceOptions) -> ImportResult<Box<dyn TabularSource>> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Delimited => Ok(Box::new(DelimitedSource::from_path(
            path,
            options.delimiter,
            options.encoding.as_deref(),
        )?)),
        SourceFormat::Workbook => Ok(Box::new(WorkbookSource::open(
            path,
            options.sheet.as_deref(),
        )?)),
    }
}

pub struct TabularReader<'a> {
    settings: &'a ImportSettings,
    options: &'a SourceOptions,
    checkpoint: Checkpoint<'a>,
    decoder: CellDecoder,
}

impl<'a> TabularReader<'a> {
    pub fn new(
        settings: &'a ImportSettings,
        options: &'a SourceOptions,
        checkpoint: Checkpoint<'a>,
    ) -> Self {
        Self {
            settings,
            options,
            checkpoint,
            decoder: CellDecoder::new(),
        }
    }

    /// Reads `path`, routing by extension.
    pub fn read(&self, path: &Path) -> ImportResult<RowSet> {
        let mut source = open_source(path, self.options)?;
        self.read_source(source.as_mut())
    }

    pub fn read_source(&self, source: &mut dyn TabularSource) -> ImportResult<RowSet> {
        self.checkpoint
            .info(&format!("Reading {}", source.describe()));
        let total_rows = source.count_rows()?;
        self.checkpoint
            .info(&format!("Detected {total_rows} row(s) including header"));
        let data_rows = total_rows.saturating_sub(1);

        let mut state = ReadState::default();
        let mut failure: Option<ImportError> = None;
        source.scan_rows(&mut |row| {
            if let Err(err) = self.checkpoint.check(0) {
                failure = Some(err);
                return Ok(RowFlow::Stop);
            }
            self.accept_row(&mut state, row, data_rows)?;
            Ok(RowFlow::Continue)
        })?;

        if let Some(err) = failure {
            self.checkpoint.info("Reading cancelled");
            return Err(err);
        }

        let mut set = state.set.ok_or(ImportError::EmptyHeader)?;
        set.extend(state.buffer.drain(..));
        if set.is_empty() {
            return Err(ImportError::NoDataRows);
        }
        self.checkpoint.progress(
            data_rows,
            data_rows,
            &format!("Read {} data row(s)", set.row_count()),
        );
        if state.skipped > 0 {
            self.checkpoint
                .info(&format!("Skipped {} empty row(s)", state.skipped));
        }
        Ok(set)
    }

    fn accept_row(
        &self,
        state: &mut ReadState,
        row: SourceRow,
        data_rows: usize,
    ) -> ImportResult<()> {
        let Some(set) = state.set.as_mut() else {
            let set = self.build_header(&row)?;
            self.checkpoint.info(&format!(
                "Read header with {} column(s)",
                set.columns().len()
            ));
            state.set = Some(set);
            return Ok(());
        };

        let dense = self.expand_row(&row, set.columns().len());
        state.seen += 1;
        if self.settings.skip_empty_rows && rows::is_blank_row(&dense) {
            state.skipped += 1;
            debug!("Skipping empty row {}", row.number);
            self.checkpoint
                .info(&format!("Skipping empty row {}", row.number));
        } else {
            state.buffer.push(dense);
            if state.buffer.len() >= CHUNK_ROWS {
                set.extend(state.buffer.drain(..));
            }
        }

        if state.seen % READ_REPORT_INTERVAL == 0 {
            self.checkpoint.progress(
                state.seen,
                data_rows,
                &format!("Reading rows {}/{}", state.seen, data_rows),
            );
        }
        Ok(())
    }

    fn build_header(&self, row: &SourceRow) -> ImportResult<RowSet> {
        if row.cells.is_empty() {
            return Err(ImportError::EmptyHeader);
        }
        let width = row.width();
        let mut names: Vec<String> = (0..width).map(rows::placeholder_header).collect();
        for (col, raw) in &row.cells {
            let decoded = self.decoder.decode(raw);
            let trimmed = decoded.trim();
            if trimmed.is_empty() {
                continue;
            }
            names[*col] = if self.options.normalize_headers {
                rows::normalize_column_name(trimmed)
            } else {
                trimmed.to_string()
            };
        }
        Ok(RowSet::new(rows::build_columns(names)))
    }

    /// Places each stored cell at its column index; gaps and missing trailing
    /// cells become nulls, cells past the header width are dropped.
    fn expand_row(&self, row: &SourceRow, width: usize) -> Row {
        let mut dense: Row = vec![None; width];
        for (col, raw) in &row.cells {
            if *col >= width {
                continue;
            }
            let decoded = self.decoder.decode(raw);
            dense[*col] = rows::normalize_cell(&decoded, self.settings.trim_strings);
        }
        dense
    }
}

#[derive(Default)]
struct ReadState {
    set: Option<RowSet>,
    buffer: Vec<Row>,
    seen: usize,
    skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cell::RawCell,
        progress::{CancellationToken, LogSink},
        source::MemorySource,
    };

    fn read(source: &mut dyn TabularSource, settings: &ImportSettings) -> ImportResult<RowSet> {
        let sink = LogSink;
        let cancel = CancellationToken::new();
        let options = SourceOptions::default();
        TabularReader::new(settings, &options, Checkpoint::new(&sink, &cancel)).read_source(source)
    }

    #[test]
    fn sparse_rows_are_expanded_by_position() {
        let mut source = MemorySource::new(vec![
            SourceRow::dense(1, ["a", "b", "c"].map(|s| RawCell::Text(s.into()))),
            SourceRow {
                number: 2,
                cells: vec![(2, RawCell::Number("3.0".into()))],
            },
            SourceRow {
                number: 3,
                cells: vec![
                    (0, RawCell::Text("x".into())),
                    (5, RawCell::Text("overflow".into())),
                ],
            },
        ]);
        let set = read(&mut source, &ImportSettings::for_table("t")).unwrap();
        assert_eq!(set.rows()[0], vec![None, None, Some("3".to_string())]);
        assert_eq!(set.rows()[1], vec![Some("x".to_string()), None, None]);
    }

    #[test]
    fn blank_header_cells_get_positional_names() {
        let mut source = MemorySource::new(vec![
            SourceRow {
                number: 1,
                cells: vec![(0, RawCell::Text("id".into())), (2, RawCell::Text(" ".into()))],
            },
            SourceRow::dense(2, [RawCell::Text("1".into())]),
        ]);
        let set = read(&mut source, &ImportSettings::for_table("t")).unwrap();
        assert_eq!(set.column_names(), vec!["id", "Column2", "Column3"]);
    }

    #[test]
    fn empty_rows_follow_the_skip_setting() {
        let rows = vec![vec!["a", "b"], vec!["", "  "], vec!["1", "2"]];
        let settings = ImportSettings::for_table("t");
        let set = read(&mut MemorySource::from_text_rows(rows.clone()), &settings).unwrap();
        assert_eq!(set.row_count(), 1);

        let keep = ImportSettings {
            skip_empty_rows: false,
            ..settings
        };
        let set = read(&mut MemorySource::from_text_rows(rows), &keep).unwrap();
        assert_eq!(set.row_count(), 2);
        assert_eq!(set.rows()[0], vec![None, None]);
    }

    #[test]
    fn structural_failures_are_reported() {
        let settings = ImportSettings::for_table("t");
        let empty: Vec<Vec<&str>> = Vec::new();
        assert!(matches!(
            read(&mut MemorySource::from_text_rows(empty), &settings),
            Err(ImportError::EmptyHeader)
        ));
        assert!(matches!(
            read(&mut MemorySource::new(vec![SourceRow::dense(1, [])]), &settings),
            Err(ImportError::EmptyHeader)
        ));
        assert!(matches!(
            read(
                &mut MemorySource::from_text_rows(vec![vec!["a"], vec![" "]]),
                &settings
            ),
            Err(ImportError::NoDataRows)
        ));
    }

    #[test]
    fn cancellation_stops_the_decoding_pass() {
        let sink = LogSink;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let settings = ImportSettings::for_table("t");
        let options = SourceOptions::default();
        let reader = TabularReader::new(&settings, &options, Checkpoint::new(&sink, &cancel));
        let mut source = MemorySource::from_text_rows(vec![vec!["a"], vec!["1"]]);
        let err = reader.read_source(&mut source).unwrap_err();
        assert!(err.is_cancelled());
    }
}
