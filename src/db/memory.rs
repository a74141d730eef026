//! In-process destination with MySQL constraint semantics.
//!
//! Used by `--dry-run` and throughout the test suite. Tables live behind a
//! shared handle so a test can inspect what a connection committed. Inserts
//! are checked the way a strict-mode MySQL server checks them: NOT NULL,
//! character capacity, integer ranges, and decimal precision. A rejected
//! insert leaves the open transaction intact.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use rust_decimal::Decimal;

use crate::{
    data::ColumnKind,
    db::{Connection, ConnectionProvider, DbError, LiveColumn, LiveSchema, SqlValue},
    sql::{InsertStatement, SchemaStatement, TextCapacity},
};

#[derive(Debug, Clone)]
struct MemoryTable {
    name: String,
    columns: Vec<LiveColumn>,
    rows: Vec<Vec<SqlValue>>,
}

impl MemoryTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Vec<MemoryTable>,
    commits: usize,
    statements: Vec<String>,
}

impl MemoryState {
    fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, DbError> {
        self.tables
            .iter_mut()
            .find(|table| table.name == name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    fn apply(&mut self, statement: &SchemaStatement) -> Result<(), DbError> {
        match statement {
            SchemaStatement::CreateTable { table, columns } => {
                if self.table(table).is_some() {
                    return Err(DbError::DuplicateTable(table.clone()));
                }
                self.tables.push(MemoryTable {
                    name: table.clone(),
                    columns: columns
                        .iter()
                        .map(|c| LiveColumn::new(c.name.clone(), c.sql_type.to_ascii_lowercase(), c.nullable))
                        .collect(),
                    rows: Vec::new(),
                });
            }
            SchemaStatement::ModifyColumn { table, column } => {
                let target = self.table_mut(table)?;
                let idx = target
                    .column_index(&column.name)
                    .ok_or_else(|| DbError::UnknownColumn {
                        table: table.clone(),
                        column: column.name.clone(),
                    })?;
                let live = &mut target.columns[idx];
                live.sql_type = column.sql_type.to_ascii_lowercase();
                live.nullable = column.nullable;
            }
            SchemaStatement::Truncate { table } => {
                self.table_mut(table)?.rows.clear();
            }
        }
        self.statements.push(statement.to_sql());
        Ok(())
    }
}

/// Shared handle to an in-memory database; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> MemoryConnection {
        MemoryConnection {
            db: self.clone(),
            pending: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a table directly, outside of any session.
    pub fn create_table(&self, table: &str, columns: Vec<LiveColumn>) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.table(table).is_some() {
            return Err(DbError::DuplicateTable(table.to_string()));
        }
        state.tables.push(MemoryTable {
            name: table.to_string(),
            columns,
            rows: Vec::new(),
        });
        Ok(())
    }

    pub fn schema(&self, table: &str) -> Option<LiveSchema> {
        self.lock()
            .table(table)
            .map(|t| LiveSchema::new(t.columns.clone()))
    }

    /// Committed rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.lock()
            .table(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.lock().table(table).map(|t| t.rows.len())
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    /// Schema statements executed so far, rendered as SQL.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }
}

impl ConnectionProvider for MemoryDatabase {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        Ok(Box::new(self.connection()))
    }

    fn describe(&self) -> String {
        "in-memory database".to_string()
    }
}

type PendingRow = (String, Vec<SqlValue>);

#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    pending: Option<Vec<PendingRow>>,
}

impl MemoryConnection {
    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    fn flush(&mut self, state: &mut MemoryState) -> Result<(), DbError> {
        let Some(rows) = self.pending.take() else {
            return Ok(());
        };
        for (table, row) in rows {
            state.table_mut(&table)?.rows.push(row);
        }
        state.commits += 1;
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn table_exists(&mut self, table: &str) -> Result<bool, DbError> {
        Ok(self.db.lock().table(table).is_some())
    }

    fn live_schema(&mut self, table: &str) -> Result<LiveSchema, DbError> {
        self.db
            .schema(table)
            .ok_or_else(|| DbError::UnknownTable(table.to_string()))
    }

    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), DbError> {
        let db = self.db.clone();
        let mut state = db.lock();
        // DDL commits any open transaction first.
        self.flush(&mut state)?;
        debug!("memory: {}", statement);
        state.apply(statement)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        if self.pending.is_some() {
            return Err(DbError::TransactionOpen);
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if self.pending.is_none() {
            return Err(DbError::NoTransaction);
        }
        let db = self.db.clone();
        let mut state = db.lock();
        self.flush(&mut state)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        match self.pending.take() {
            Some(_) => Ok(()),
            None => Err(DbError::NoTransaction),
        }
    }

    fn insert(&mut self, statement: &InsertStatement, values: &[SqlValue]) -> Result<(), DbError> {
        let db = self.db.clone();
        let mut state = db.lock();
        let table = state
            .table(statement.table())
            .ok_or_else(|| DbError::UnknownTable(statement.table().to_string()))?;
        if statement.columns().len() != values.len() {
            return Err(DbError::Statement(format!(
                "column count ({}) does not match value count ({})",
                statement.columns().len(),
                values.len()
            )));
        }

        let mut row = vec![SqlValue::Null; table.columns.len()];
        let mut assigned = vec![false; table.columns.len()];
        for (name, value) in statement.columns().iter().zip(values) {
            let idx = table
                .column_index(name)
                .ok_or_else(|| DbError::UnknownColumn {
                    table: table.name.clone(),
                    column: name.clone(),
                })?;
            check_value(&table.columns[idx], value)?;
            row[idx] = value.clone();
            assigned[idx] = true;
        }
        for (column, _) in table.columns.iter().zip(&assigned).filter(|(_, set)| !**set) {
            check_value(column, &SqlValue::Null)?;
        }

        match self.pending.as_mut() {
            Some(pending) => pending.push((statement.table().to_string(), row)),
            None => {
                state.table_mut(statement.table())?.rows.push(row);
                state.commits += 1;
            }
        }
        Ok(())
    }
}

fn constraint(column: &LiveColumn, message: impl Into<String>) -> DbError {
    DbError::Constraint {
        column: column.name.clone(),
        message: message.into(),
    }
}

fn integer_range(sql_type: &str) -> (i128, i128) {
    let upper = sql_type.to_ascii_uppercase();
    let unsigned = upper.contains("UNSIGNED");
    let bits: u32 = if upper.starts_with("TINYINT") {
        8
    } else if upper.starts_with("SMALLINT") {
        16
    } else if upper.starts_with("MEDIUMINT") {
        24
    } else if upper.starts_with("BIGINT") {
        64
    } else {
        32
    };
    if unsigned {
        (0, (1i128 << bits) - 1)
    } else {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    }
}

/// `(precision, scale)` of a `DECIMAL(p,s)` declaration.
fn decimal_shape(sql_type: &str) -> Option<(u32, u32)> {
    let open = sql_type.find('(')?;
    let close = sql_type[open..].find(')')? + open;
    let mut parts = sql_type[open + 1..close].split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = parts.next().map_or(Some(0), |s| s.trim().parse().ok())?;
    Some((precision, scale))
}

fn integer_digits(value: &Decimal) -> u32 {
    let whole = value.trunc().abs();
    if whole.is_zero() {
        0
    } else {
        whole.normalize().to_string().len() as u32
    }
}

fn check_value(column: &LiveColumn, value: &SqlValue) -> Result<(), DbError> {
    if value.is_null() {
        return if column.nullable {
            Ok(())
        } else {
            Err(constraint(column, "cannot be null"))
        };
    }
    match (ColumnKind::from_sql_type(&column.sql_type), value) {
        (ColumnKind::Integer, SqlValue::Integer(v)) => {
            let (min, max) = integer_range(&column.sql_type);
            if (*v as i128) < min || (*v as i128) > max {
                return Err(constraint(column, format!("value {v} out of range")));
            }
        }
        (ColumnKind::Decimal, SqlValue::Decimal(v)) => {
            if let Some((precision, scale)) = decimal_shape(&column.sql_type) {
                if integer_digits(v) > precision.saturating_sub(scale) {
                    return Err(constraint(column, format!("value {v} out of range")));
                }
            }
        }
        (ColumnKind::Decimal, SqlValue::Integer(_))
        | (ColumnKind::DateTime, SqlValue::DateTime(_))
        | (ColumnKind::Time, SqlValue::Time(_)) => {}
        (ColumnKind::Text, other) => {
            if let Some(capacity) = TextCapacity::parse(&column.sql_type) {
                let text = other.to_string();
                if !capacity.fits(text.chars().count(), text.len()) {
                    return Err(constraint(column, "data too long"));
                }
            }
        }
        (kind, other) => {
            return Err(constraint(
                column,
                format!("incorrect {kind} value '{other}'"),
            ));
        }
    }
    Ok(())
}
