//! MySQL session over `sqlx`, driven from synchronous code.
//!
//! The pipeline is a single sequential worker, so each session owns a
//! current-thread tokio runtime and blocks on every statement. Inserts go
//! through `sqlx::query`, whose per-connection statement cache prepares the
//! `INSERT` once and reuses it for every row.

use std::str::FromStr;

use log::debug;
use sqlx::{
    Connection as _, Row,
    mysql::{MySqlConnectOptions, MySqlConnection},
};
use tokio::runtime::{Builder, Runtime};

use crate::{
    db::{Connection, ConnectionProvider, DbError, LiveColumn, LiveSchema, SqlValue},
    settings::DatabaseConfig,
    sql::{InsertStatement, SchemaStatement},
};

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_name = ?";

const LIVE_SCHEMA_SQL: &str = "SELECT CAST(column_name AS CHAR) AS name, \
     CAST(column_type AS CHAR) AS sql_type, \
     CAST(is_nullable AS CHAR) AS nullable \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY ordinal_position";

/// Opens sessions from resolved connect options.
#[derive(Debug, Clone)]
pub struct MySqlProvider {
    options: MySqlConnectOptions,
    description: String,
}

impl MySqlProvider {
    /// Parses a `mysql://` URL.
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        Ok(Self {
            options: MySqlConnectOptions::from_str(url)?,
            description: redact_url(url),
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .database(&config.database);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }
        Self {
            options,
            description: format!("mysql://{}:{}/{}", config.host, config.port, config.database),
        }
    }

    pub fn options(&self) -> &MySqlConnectOptions {
        &self.options
    }
}

/// `url` with any `user:password@` part removed.
pub fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://{host}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

impl ConnectionProvider for MySqlProvider {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| DbError::Connect(err.to_string()))?;
        let conn = runtime.block_on(MySqlConnection::connect_with(&self.options))?;
        debug!("Connected to {}", self.describe());
        Ok(Box::new(MySqlSession {
            runtime,
            conn,
            in_transaction: false,
        }))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

pub struct MySqlSession {
    runtime: Runtime,
    conn: MySqlConnection,
    in_transaction: bool,
}

impl MySqlSession {
    fn raw(&mut self, sql: &str) -> Result<(), DbError> {
        let conn = &mut self.conn;
        self.runtime
            .block_on(async { sqlx::raw_sql(sql).execute(&mut *conn).await })?;
        Ok(())
    }
}

impl Connection for MySqlSession {
    fn table_exists(&mut self, table: &str) -> Result<bool, DbError> {
        let conn = &mut self.conn;
        let count: i64 = self.runtime.block_on(async {
            sqlx::query_scalar(TABLE_EXISTS_SQL)
                .bind(table)
                .fetch_one(&mut *conn)
                .await
        })?;
        Ok(count > 0)
    }

    fn live_schema(&mut self, table: &str) -> Result<LiveSchema, DbError> {
        let conn = &mut self.conn;
        let rows = self.runtime.block_on(async {
            sqlx::query(LIVE_SCHEMA_SQL)
                .bind(table)
                .fetch_all(&mut *conn)
                .await
        })?;
        if rows.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }
        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let sql_type: String = row.try_get("sql_type")?;
                let nullable: String = row.try_get("nullable")?;
                Ok(LiveColumn::new(
                    name,
                    sql_type,
                    nullable.eq_ignore_ascii_case("YES"),
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(LiveSchema::new(columns))
    }

    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), DbError> {
        let sql = statement.to_sql();
        debug!("mysql: {sql}");
        self.raw(&sql)?;
        // DDL implicitly commits.
        self.in_transaction = false;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            return Err(DbError::TransactionOpen);
        }
        self.raw("START TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::NoTransaction);
        }
        self.raw("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::NoTransaction);
        }
        self.in_transaction = false;
        self.raw("ROLLBACK")
    }

    fn insert(&mut self, statement: &InsertStatement, values: &[SqlValue]) -> Result<(), DbError> {
        let mut query = sqlx::query(statement.sql());
        for value in values {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Decimal(v) => query.bind(*v),
                SqlValue::DateTime(v) => query.bind(*v),
                SqlValue::Time(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }
        let conn = &mut self.conn;
        self.runtime
            .block_on(async { query.execute(&mut *conn).await })?;
        Ok(())
    }
}
