//! Top-level sequencing of one import: read, infer, reconcile, load.
//!
//! [`ImportCoordinator`] owns the settings, the sink, and the cancellation
//! token for a single run and walks the [`ImportPhase`] state machine.
//! Structural and schema failures surface before anything is written;
//! abort and cancellation surface after earlier batches were committed.

use std::{cell::Cell, path::Path};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    db::Connection,
    error::{ImportError, ImportResult},
    loader::{BatchLoader, LoadResult},
    progress::{CancellationToken, Checkpoint, ImportSink},
    reader::{self, TabularReader},
    reconcile::{ColumnMigration, SchemaAction, SchemaReconciler},
    rows::RowSet,
    schema::{ColumnProfile, InferenceOptions, SchemaInferencer},
    settings::{ImportSettings, SourceOptions},
    source::TabularSource,
    sql,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Idle,
    Reading,
    Reconciling,
    Provisioning,
    Migrating,
    Loading,
    Completed,
    Failed,
    Cancelled,
}

impl ImportPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImportPhase::Completed | ImportPhase::Failed | ImportPhase::Cancelled
        )
    }

    pub fn can_transition_to(self, next: ImportPhase) -> bool {
        use ImportPhase::*;
        matches!(
            (self, next),
            (Idle, Reading)
                | (Idle, Failed)
                | (Reading, Reconciling)
                | (Reading, Failed)
                | (Reading, Cancelled)
                | (Reconciling, Provisioning)
                | (Reconciling, Migrating)
                | (Reconciling, Failed)
                | (Provisioning, Loading)
                | (Provisioning, Failed)
                | (Migrating, Loading)
                | (Migrating, Failed)
                | (Loading, Completed)
                | (Loading, Failed)
                | (Loading, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Completed,
    CompletedWithErrors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub table: String,
    /// Data rows read from the source after filtering.
    pub source_rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub action: SchemaAction,
    pub migrations: Vec<ColumnMigration>,
    pub load: LoadResult,
    pub status: ImportStatus,
}

pub struct ImportCoordinator<'a> {
    settings: ImportSettings,
    source_options: SourceOptions,
    inference: InferenceOptions,
    sink: &'a dyn ImportSink,
    cancel: CancellationToken,
    phase: Cell<ImportPhase>,
}

impl<'a> ImportCoordinator<'a> {
    pub fn new(settings: ImportSettings, sink: &'a dyn ImportSink) -> Self {
        Self {
            settings,
            source_options: SourceOptions::default(),
            inference: InferenceOptions::default(),
            sink,
            cancel: CancellationToken::new(),
            phase: Cell::new(ImportPhase::Idle),
        }
    }

    pub fn with_source_options(mut self, options: SourceOptions) -> Self {
        self.source_options = options;
        self
    }

    pub fn with_inference(mut self, options: InferenceOptions) -> Self {
        self.inference = options;
        self
    }

    /// Uses an externally owned token so a host can cancel the run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase.get()
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Imports the file at `path`, choosing the reader by extension.
    pub fn run(&mut self, path: &Path, conn: &mut dyn Connection) -> ImportResult<ImportSummary> {
        let mut source = match reader::open_source(path, &self.source_options) {
            Ok(source) => source,
            Err(err) => return Err(self.fail(err)),
        };
        self.run_source(source.as_mut(), conn)
    }

    pub fn run_source(
        &mut self,
        source: &mut dyn TabularSource,
        conn: &mut dyn Connection,
    ) -> ImportResult<ImportSummary> {
        match self.execute(source, conn) {
            Ok(summary) => {
                self.advance(ImportPhase::Completed);
                Ok(summary)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn execute(
        &self,
        source: &mut dyn TabularSource,
        conn: &mut dyn Connection,
    ) -> ImportResult<ImportSummary> {
        self.settings.validate()?;
        self.advance(ImportPhase::Reading);
        let rows = self.read(source)?;
        self.validate_identifiers(&rows)?;

        self.advance(ImportPhase::Reconciling);
        let inferred = SchemaInferencer::new(self.inference).infer(&rows);
        for profile in inferred.columns() {
            debug!(
                "Column {} inferred as {} ({})",
                profile.name,
                profile.inferred,
                profile.sql_type()
            );
        }
        let checkpoint = Checkpoint::new(self.sink, &self.cancel);
        let reconciler = SchemaReconciler::new(&self.settings, checkpoint);
        let plan = reconciler.plan(conn, &inferred)?;
        let next = match plan.action {
            SchemaAction::Create => ImportPhase::Provisioning,
            SchemaAction::Truncate | SchemaAction::Migrate => ImportPhase::Migrating,
        };
        self.advance(next);
        let live = reconciler.apply(conn, &plan, &rows.column_names())?;

        self.advance(ImportPhase::Loading);
        let checkpoint = Checkpoint::new(self.sink, &self.cancel);
        let load = BatchLoader::new(&self.settings, checkpoint).load(conn, &rows, &live)?;

        let status = if load.is_clean() {
            ImportStatus::Completed
        } else {
            ImportStatus::CompletedWithErrors
        };
        Ok(ImportSummary {
            table: self.settings.table_name.clone(),
            source_rows: rows.row_count(),
            columns: inferred.columns().to_vec(),
            action: plan.action,
            migrations: plan.migrations,
            load,
            status,
        })
    }

    fn read(&self, source: &mut dyn TabularSource) -> ImportResult<RowSet> {
        let checkpoint = Checkpoint::new(self.sink, &self.cancel);
        TabularReader::new(&self.settings, &self.source_options, checkpoint).read_source(source)
    }

    fn validate_identifiers(&self, rows: &RowSet) -> ImportResult<()> {
        sql::validate_identifier(&self.settings.table_name)?;
        for column in rows.columns() {
            sql::validate_identifier(&column.name)?;
        }
        Ok(())
    }

    fn advance(&self, next: ImportPhase) {
        let current = self.phase.get();
        if !current.can_transition_to(next) {
            warn!("Unexpected import phase change {current:?} -> {next:?}");
        }
        debug!("Import phase {current:?} -> {next:?}");
        self.phase.set(next);
    }

    fn fail(&self, err: ImportError) -> ImportError {
        let next = if err.is_cancelled() {
            ImportPhase::Cancelled
        } else {
            ImportPhase::Failed
        };
        if !self.phase.get().is_terminal() {
            self.advance(next);
        }
        err
    }
}
