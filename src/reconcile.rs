//! Decides what to do with the destination table before any row is loaded.
//!
//! [`plan`] is pure: given the import mode, the live schema (if the table
//! exists), and the inferred column profiles, it returns the statements to
//! run. [`SchemaReconciler::apply`] runs them, re-reads the live schema, and
//! re-checks column parity. Existing columns are only ever widened: a column
//! gains nullability when this import carries nulls for it, and text columns
//! move up a capacity tier when the observed values would not fit.

use log::{debug, info};
use serde::Serialize;

use crate::{
    db::{Connection, LiveSchema},
    error::{ImportError, ImportResult},
    progress::Checkpoint,
    schema::InferredSchema,
    settings::{ImportMode, ImportSettings},
    sql::{ColumnDefinition, SchemaStatement, TextCapacity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaAction {
    /// The table did not exist and is created from the inferred schema.
    Create,
    /// The table exists and is emptied before loading.
    Truncate,
    /// The table exists; zero or more columns are widened.
    Migrate,
}

/// One widening `ALTER TABLE ... MODIFY COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMigration {
    pub column: String,
    pub from_type: String,
    pub to_type: String,
    pub from_nullable: bool,
    pub to_nullable: bool,
}

impl ColumnMigration {
    pub fn widens_type(&self) -> bool {
        self.from_type != self.to_type
    }

    pub fn relaxes_null(&self) -> bool {
        !self.from_nullable && self.to_nullable
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub table: String,
    pub action: SchemaAction,
    pub migrations: Vec<ColumnMigration>,
    pub statements: Vec<SchemaStatement>,
}

impl SchemaPlan {
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Fails unless `live` has exactly the row set's columns.
pub fn validate_parity(columns: &[String], live: &LiveSchema) -> ImportResult<()> {
    if columns.len() != live.len() {
        return Err(ImportError::schema_mismatch(format!(
            "data has {} column(s) but the table has {}",
            columns.len(),
            live.len()
        )));
    }
    if let Some(missing) = columns.iter().find(|name| !live.contains(name)) {
        return Err(ImportError::schema_mismatch(format!(
            "column '{missing}' does not exist in the table"
        )));
    }
    Ok(())
}

/// Computes the schema statements for one import without touching the database.
pub fn plan(
    settings: &ImportSettings,
    existing: Option<&LiveSchema>,
    inferred: &InferredSchema,
) -> ImportResult<SchemaPlan> {
    let table = settings.table_name.clone();
    let Some(live) = existing else {
        if !settings.create_if_missing {
            return Err(ImportError::TableNotFound { table });
        }
        let create = inferred.create_statement(&table);
        return Ok(SchemaPlan {
            table,
            action: SchemaAction::Create,
            migrations: Vec::new(),
            statements: vec![create],
        });
    };

    let names: Vec<String> = inferred.columns().iter().map(|c| c.name.clone()).collect();
    match settings.mode {
        ImportMode::ErrorIfExists => Err(ImportError::TableAlreadyExists { table }),
        ImportMode::ClearAndImport => {
            validate_parity(&names, live)?;
            Ok(SchemaPlan {
                statements: vec![SchemaStatement::Truncate {
                    table: table.clone(),
                }],
                table,
                action: SchemaAction::Truncate,
                migrations: Vec::new(),
            })
        }
        ImportMode::Append => {
            validate_parity(&names, live)?;
            let mut migrations = Vec::new();
            for profile in inferred.columns() {
                let column = live.get(&profile.name).ok_or_else(|| {
                    ImportError::schema_mismatch(format!(
                        "column '{}' does not exist in the table",
                        profile.name
                    ))
                })?;
                let to_nullable = column.nullable || profile.has_nulls();
                let to_type = TextCapacity::parse(&column.sql_type)
                    .and_then(|capacity| capacity.widen_for(profile.max_chars, profile.max_bytes))
                    .map(|capacity| capacity.to_string())
                    .unwrap_or_else(|| column.sql_type.clone());
                let migration = ColumnMigration {
                    column: column.name.clone(),
                    from_type: column.sql_type.clone(),
                    to_type,
                    from_nullable: column.nullable,
                    to_nullable,
                };
                if migration.widens_type() || migration.relaxes_null() {
                    migrations.push(migration);
                }
            }
            let statements = migrations
                .iter()
                .map(|m| SchemaStatement::ModifyColumn {
                    table: table.clone(),
                    column: ColumnDefinition::new(m.column.clone(), m.to_type.clone(), m.to_nullable),
                })
                .collect();
            Ok(SchemaPlan {
                table,
                action: SchemaAction::Migrate,
                migrations,
                statements,
            })
        }
    }
}

pub struct SchemaReconciler<'a> {
    settings: &'a ImportSettings,
    checkpoint: Checkpoint<'a>,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(settings: &'a ImportSettings, checkpoint: Checkpoint<'a>) -> Self {
        Self {
            settings,
            checkpoint,
        }
    }

    /// Reads the current live schema (if any) and plans against it.
    pub fn plan(
        &self,
        conn: &mut dyn Connection,
        inferred: &InferredSchema,
    ) -> ImportResult<SchemaPlan> {
        let table = &self.settings.table_name;
        let exists = conn.table_exists(table)?;
        self.checkpoint.info(&format!(
            "Table {table} {}",
            if exists { "exists" } else { "does not exist" }
        ));
        let live = if exists {
            Some(conn.live_schema(table)?)
        } else {
            None
        };
        let plan = plan(self.settings, live.as_ref(), inferred);
        if let Err(err) = &plan {
            self.checkpoint.error(&err.to_string());
        }
        plan
    }

    /// Runs the plan and returns the live schema the loader must bind against.
    pub fn apply(
        &self,
        conn: &mut dyn Connection,
        plan: &SchemaPlan,
        columns: &[String],
    ) -> ImportResult<LiveSchema> {
        for migration in &plan.migrations {
            info!(
                "Widening column {} from {}{} to {}{}",
                migration.column,
                migration.from_type,
                if migration.from_nullable { " NULL" } else { " NOT NULL" },
                migration.to_type,
                if migration.to_nullable { " NULL" } else { " NOT NULL" },
            );
        }
        for statement in &plan.statements {
            self.checkpoint.info(&format!("Executing: {statement}"));
            conn.execute(statement)?;
        }
        if plan.is_noop() {
            debug!("Table {} needs no schema changes", plan.table);
        }
        let live = conn.live_schema(&plan.table)?;
        validate_parity(columns, &live)?;
        Ok(live)
    }
}
