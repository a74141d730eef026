//! Destination database abstraction.
//!
//! The pipeline talks to the destination through [`Connection`], a single
//! exclusively-owned session. Two backends implement it: an in-process
//! [`memory::MemoryDatabase`] with MySQL constraint semantics and, behind the
//! `mysql` feature, a `sqlx` MySQL session.

pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;

use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::sql::{InsertStatement, SchemaStatement};

/// A bind parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::Decimal(v) => write!(f, "{v}"),
            SqlValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            SqlValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
            SqlValue::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    /// Declared type as reported by the server, e.g. `varchar(50)`.
    pub sql_type: String,
    pub nullable: bool,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
        }
    }
}

/// Column metadata of an existing table, in ordinal order.
///
/// Lookups are case-insensitive, matching MySQL column name resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
    columns: Vec<LiveColumn>,
}

impl LiveSchema {
    pub fn new(columns: Vec<LiveColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[LiveColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    #[error("column '{column}': {message}")]
    Constraint { column: String, message: String },

    #[error("no transaction is open")]
    NoTransaction,

    #[error("a transaction is already open")]
    TransactionOpen,

    #[error("{0}")]
    Statement(String),

    #[cfg(feature = "mysql")]
    #[error(transparent)]
    Driver(#[from] sqlx::Error),
}

/// One exclusively-owned session against the destination database.
///
/// Schema statements run outside of any transaction. Rows are inserted
/// between [`Connection::begin`] and [`Connection::commit`]; a failed
/// [`Connection::insert`] leaves the open transaction usable.
pub trait Connection {
    fn table_exists(&mut self, table: &str) -> Result<bool, DbError>;

    fn live_schema(&mut self, table: &str) -> Result<LiveSchema, DbError>;

    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), DbError>;

    fn begin(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    fn insert(&mut self, statement: &InsertStatement, values: &[SqlValue]) -> Result<(), DbError>;
}

/// Source of ready sessions.
pub trait ConnectionProvider {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError>;

    /// Human-readable target for log lines; must not include credentials.
    fn describe(&self) -> String;
}
