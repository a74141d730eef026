//! Error types shared by the reader, reconciler, and loader.
//!
//! [`ImportError`] is the hard-failure enum returned from every pipeline stage.
//! Per-row problems are not errors in this sense: they are [`RowError`] values
//! that the loader counts and logs while it keeps going.

use std::fmt;

use thiserror::Error;

use crate::db::DbError;

/// Convenience result type for pipeline operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Coarse classification used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source or the settings are unusable; nothing was written.
    Structural,
    /// The destination table cannot accept this data; nothing was written.
    Schema,
    /// Too many rows failed; earlier committed batches remain.
    LoadAbort,
    /// Stopped by the cancellation signal; earlier committed batches remain.
    Cancelled,
    /// The source file could not be opened or parsed.
    Source,
    /// The database backend reported a failure outside of row processing.
    Backend,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("workbook does not contain any sheets")]
    EmptySheet,

    #[error("header row is empty")]
    EmptyHeader,

    #[error("no data rows remain after filtering")]
    NoDataRows,

    #[error("invalid identifier '{name}': only letters, digits and '_' are allowed")]
    InvalidIdentifier { name: String },

    #[error("table '{table}' already exists")]
    TableAlreadyExists { table: String },

    #[error("table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    #[error("import aborted after {errors} row error(s); {committed} row(s) were already committed")]
    TooManyErrors { errors: usize, committed: usize },

    #[error("import cancelled; {committed} row(s) were already committed")]
    Cancelled { committed: usize },

    #[error("sheet '{name}' not found (available: {available:?})")]
    SheetNotFound { name: String, available: Vec<String> },

    #[error("workbook has {} sheets; choose one of {available:?}", available.len())]
    SheetSelectionRequired { available: Vec<String> },

    #[error("unsupported input format '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::EmptySheet
            | ImportError::EmptyHeader
            | ImportError::NoDataRows
            | ImportError::InvalidIdentifier { .. }
            | ImportError::InvalidSettings { .. } => ErrorKind::Structural,
            ImportError::TableAlreadyExists { .. }
            | ImportError::TableNotFound { .. }
            | ImportError::SchemaMismatch { .. } => ErrorKind::Schema,
            ImportError::TooManyErrors { .. } => ErrorKind::LoadAbort,
            ImportError::Cancelled { .. } => ErrorKind::Cancelled,
            ImportError::SheetNotFound { .. }
            | ImportError::SheetSelectionRequired { .. }
            | ImportError::UnsupportedFormat { .. }
            | ImportError::Io(_)
            | ImportError::Csv(_)
            | ImportError::Workbook(_) => ErrorKind::Source,
            ImportError::Database(_) => ErrorKind::Backend,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::Cancelled { .. })
    }

    /// Rows that were durably committed before the failure.
    pub fn committed_rows(&self) -> usize {
        match self {
            ImportError::TooManyErrors { committed, .. } | ImportError::Cancelled { committed } => {
                *committed
            }
            _ => 0,
        }
    }

    pub(crate) fn schema_mismatch(message: impl Into<String>) -> Self {
        ImportError::SchemaMismatch {
            message: message.into(),
        }
    }
}

/// A recoverable failure confined to one source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub column: Option<String>,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            column: None,
            message: message.into(),
        }
    }

    pub fn in_column(row: usize, column: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "row {} column '{}': {}", self.row, column, self.message),
            None => write!(f, "row {}: {}", self.row, self.message),
        }
    }
}

impl std::error::Error for RowError {}
