//! Transactional batch insertion with bounded per-row error tolerance.
//!
//! Rows are inserted through one parameterised statement. A transaction is
//! committed every `batch_size` successful rows and once more for the
//! remainder. A failing row is logged, counted, and skipped; the tenth
//! failure rolls back the open batch and aborts the load. Batches committed
//! before an abort or a cancellation stay committed.

use log::debug;
use serde::Serialize;

use crate::{
    data::RowCoercer,
    db::{Connection, LiveSchema},
    error::{ImportError, ImportResult, RowError},
    progress::Checkpoint,
    rows::RowSet,
    settings::ImportSettings,
    sql::InsertStatement,
};

/// Row failures tolerated before the load is aborted.
pub const MAX_ROW_ERRORS: usize = 10;
/// Rows between load-phase progress reports.
pub const LOAD_REPORT_INTERVAL: usize = 2_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    /// Rows inserted without error.
    pub succeeded: usize,
    /// Rows skipped because of a row error.
    pub failed: usize,
    /// Rows durably committed.
    pub committed: usize,
    /// Transactions committed.
    pub commits: usize,
}

impl LoadResult {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

pub struct BatchLoader<'a> {
    settings: &'a ImportSettings,
    checkpoint: Checkpoint<'a>,
    max_errors: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(settings: &'a ImportSettings, checkpoint: Checkpoint<'a>) -> Self {
        Self {
            settings,
            checkpoint,
            max_errors: MAX_ROW_ERRORS,
        }
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    pub fn load(
        &self,
        conn: &mut dyn Connection,
        rows: &RowSet,
        live: &LiveSchema,
    ) -> ImportResult<LoadResult> {
        let columns = rows.column_names();
        let statement = InsertStatement::new(&self.settings.table_name, &columns)?;
        self.checkpoint.info(&format!("SQL: {}", statement.sql()));
        let coercer = RowCoercer::new(rows.columns(), live)?;
        debug!("Column coercions: {:?}", coercer.kinds());

        let total = rows.row_count();
        let batch_size = self.settings.batch_size.max(1);
        let mut result = LoadResult::default();
        let mut in_batch = 0usize;

        conn.begin()?;
        for (idx, row) in rows.rows().iter().enumerate() {
            if self.checkpoint.is_cancelled() {
                conn.rollback()?;
                self.checkpoint.info(&format!(
                    "Import cancelled; {} row(s) committed before cancellation",
                    result.committed
                ));
                return Err(ImportError::Cancelled {
                    committed: result.committed,
                });
            }

            let row_number = idx + 1;
            match self.insert_row(conn, &coercer, &statement, row_number, row) {
                Ok(()) => {
                    result.succeeded += 1;
                    in_batch += 1;
                }
                Err(err) => {
                    result.failed += 1;
                    self.checkpoint
                        .error(&format!("Failed to import {err}"));
                    if result.failed >= self.max_errors {
                        conn.rollback()?;
                        self.checkpoint.error(&format!(
                            "Aborting after {} row error(s); {} row(s) were committed earlier",
                            result.failed, result.committed
                        ));
                        return Err(ImportError::TooManyErrors {
                            errors: result.failed,
                            committed: result.committed,
                        });
                    }
                }
            }

            let processed = idx + 1;
            if processed % LOAD_REPORT_INTERVAL == 0 || processed == total {
                self.checkpoint.progress(
                    processed,
                    total,
                    &format!("Processed {processed}/{total} rows"),
                );
            }

            if in_batch >= batch_size {
                conn.commit()?;
                result.committed += in_batch;
                result.commits += 1;
                debug!("Committed batch of {in_batch} row(s)");
                in_batch = 0;
                conn.begin()?;
            }
        }

        if in_batch > 0 {
            conn.commit()?;
            result.committed += in_batch;
            result.commits += 1;
            self.checkpoint
                .info(&format!("Committed final {in_batch} row(s)"));
        } else {
            conn.rollback()?;
        }

        if result.is_clean() {
            self.checkpoint
                .info(&format!("Imported {} row(s)", result.succeeded));
        } else {
            self.checkpoint.info(&format!(
                "Import completed with errors: {} row(s) imported, {} failed",
                result.succeeded, result.failed
            ));
        }
        Ok(result)
    }

    fn insert_row(
        &self,
        conn: &mut dyn Connection,
        coercer: &RowCoercer,
        statement: &InsertStatement,
        row_number: usize,
        row: &[Option<String>],
    ) -> Result<(), RowError> {
        let coerced = coercer.coerce(row_number, row)?;
        for warning in &coerced.warnings {
            self.checkpoint.info(&format!("Warning: {warning}"));
        }
        conn.insert(statement, &coerced.values)
            .map_err(|err| RowError::new(row_number, err.to_string()))
    }
}
