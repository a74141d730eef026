//! Import configuration.
//!
//! [`ImportSettings`] is resolved before the pipeline starts (from CLI flags,
//! optionally layered over a YAML file) and is read-only afterwards.
//! [`SourceOptions`] carries the reader-side knobs that do not affect the
//! destination table.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, ImportResult};

pub const MAX_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ImportMode {
    /// Add rows to an existing table, widening columns where needed
    #[default]
    Append,
    /// Truncate an existing table, then load
    ClearAndImport,
    /// Refuse to touch an existing table
    ErrorIfExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSettings {
    pub table_name: String,
    pub mode: ImportMode,
    pub create_if_missing: bool,
    pub trim_strings: bool,
    pub skip_empty_rows: bool,
    pub batch_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            mode: ImportMode::Append,
            create_if_missing: true,
            trim_strings: true,
            skip_empty_rows: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ImportSettings {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table_name: table.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings YAML {path:?}"))?;
        Ok(settings)
    }

    pub fn validate(&self) -> ImportResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(ImportError::InvalidSettings {
                message: "table name must not be empty".to_string(),
            });
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ImportError::InvalidSettings {
                message: format!(
                    "batch size must be between 1 and {MAX_BATCH_SIZE} (got {})",
                    self.batch_size
                ),
            });
        }
        Ok(())
    }
}

/// Reader-side options resolved by the host before reading.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Worksheet to read; required when a workbook holds several.
    pub sheet: Option<String>,
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
    /// Rewrite header names into the identifier alphabet before de-duplication.
    pub normalize_headers: bool,
}

/// Discrete MySQL connection parameters, used when no URL is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MYSQL_PORT,
            database: String::new(),
            username: "root".to_string(),
            password: String::new(),
        }
    }
}
