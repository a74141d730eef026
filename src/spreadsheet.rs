//! Workbook source (`.xlsx`, `.xlsm`) streamed cell by cell through calamine.
//!
//! Cells are visited in storage order without materialising the sheet range,
//! so memory use is bounded by one row. Both passes reopen the workbook.

use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx, open_workbook};
use log::debug;

use crate::{
    cell::RawCell,
    error::{ImportError, ImportResult},
    source::{RowFlow, SourceRow, TabularSource},
};

/// Sheet names in workbook order.
pub fn list_sheets(path: &Path) -> ImportResult<Vec<String>> {
    let workbook: Xlsx<_> = open_workbook(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Picks the sheet to read.
///
/// A single-sheet workbook needs no choice; otherwise the caller must name
/// one of `available`.
pub fn resolve_sheet(available: &[String], requested: Option<&str>) -> ImportResult<String> {
    if available.is_empty() {
        return Err(ImportError::EmptySheet);
    }
    match requested {
        Some(name) => available
            .iter()
            .find(|sheet| sheet.as_str() == name)
            .cloned()
            .ok_or_else(|| ImportError::SheetNotFound {
                name: name.to_string(),
                available: available.to_vec(),
            }),
        None if available.len() == 1 => Ok(available[0].clone()),
        None => Err(ImportError::SheetSelectionRequired {
            available: available.to_vec(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct WorkbookSource {
    path: PathBuf,
    sheet: String,
}

impl WorkbookSource {
    pub fn new(path: impl AsRef<Path>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sheet: sheet.into(),
        }
    }

    /// Opens `path`, resolving `sheet` against the workbook's sheet list.
    pub fn open(path: impl AsRef<Path>, sheet: Option<&str>) -> ImportResult<Self> {
        let path = path.as_ref();
        let sheets = list_sheets(path)?;
        debug!("Workbook {:?} has {} sheet(s): {:?}", path, sheets.len(), sheets);
        let sheet = resolve_sheet(&sheets, sheet)?;
        Ok(Self::new(path, sheet))
    }

    fn for_each_cell(
        &self,
        mut visit: impl FnMut(usize, usize, RawCell) -> ImportResult<RowFlow>,
    ) -> ImportResult<()> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let mut cells = workbook.worksheet_cells_reader(&self.sheet)?;
        while let Some(cell) = cells.next_cell()? {
            let (row, col) = cell.get_position();
            let raw = RawCell::from(cell.get_value());
            if visit(row as usize, col as usize, raw)? == RowFlow::Stop {
                break;
            }
        }
        Ok(())
    }
}

impl TabularSource for WorkbookSource {
    fn describe(&self) -> String {
        format!("workbook {:?} sheet '{}'", self.path, self.sheet)
    }

    fn count_rows(&mut self) -> ImportResult<usize> {
        let mut count = 0usize;
        let mut current: Option<usize> = None;
        self.for_each_cell(|row, _, _| {
            if current != Some(row) {
                current = Some(row);
                count += 1;
            }
            Ok(RowFlow::Continue)
        })?;
        Ok(count)
    }

    fn scan_rows(
        &mut self,
        visit: &mut dyn FnMut(SourceRow) -> ImportResult<RowFlow>,
    ) -> ImportResult<()> {
        let mut pending: Option<SourceRow> = None;
        let mut stopped = false;
        self.for_each_cell(|row, col, raw| {
            let number = row + 1;
            match pending.as_mut() {
                Some(current) if current.number == number => {
                    current.cells.push((col, raw));
                    return Ok(RowFlow::Continue);
                }
                _ => {}
            }
            let next = SourceRow {
                number,
                cells: vec![(col, raw)],
            };
            if let Some(done) = pending.replace(next) {
                if visit(done)? == RowFlow::Stop {
                    stopped = true;
                    return Ok(RowFlow::Stop);
                }
            }
            Ok(RowFlow::Continue)
        })?;
        if !stopped {
            if let Some(last) = pending {
                visit(last)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_sheet_needs_no_selection() {
        assert_eq!(resolve_sheet(&names(&["Data"]), None).unwrap(), "Data");
    }

    #[test]
    fn multiple_sheets_require_a_choice() {
        let available = names(&["One", "Two"]);
        assert!(matches!(
            resolve_sheet(&available, None),
            Err(ImportError::SheetSelectionRequired { .. })
        ));
        assert_eq!(resolve_sheet(&available, Some("Two")).unwrap(), "Two");
        assert!(matches!(
            resolve_sheet(&available, Some("Three")),
            Err(ImportError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn zero_sheets_is_an_empty_workbook() {
        assert!(matches!(
            resolve_sheet(&[], Some("x")),
            Err(ImportError::EmptySheet)
        ));
    }
}
