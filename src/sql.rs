//! MySQL statement rendering, identifier validation, and text capacity tiers.
//!
//! Identifiers are the only values ever interpolated into SQL text, so every
//! table and column name is checked against the `[A-Za-z0-9_]` allow-list
//! before a statement is built. Cell values always travel as bind parameters.

use std::{fmt, sync::OnceLock};

use itertools::Itertools;
use regex::Regex;

use crate::error::{ImportError, ImportResult};

pub const TABLE_CHARSET: &str = "utf8mb4";
pub const TABLE_COLLATION: &str = "utf8mb4_unicode_ci";

/// Longest text kept in a `VARCHAR` when the type is chosen from data.
pub const VARCHAR_MAX_CHARS: usize = 255;
pub const TINYTEXT_MAX_BYTES: usize = 255;
pub const TEXT_MAX_BYTES: usize = 65_535;
pub const MEDIUMTEXT_MAX_BYTES: usize = 16_777_215;

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern"))
}

pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

pub fn validate_identifier(name: &str) -> ImportResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ImportError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Backtick-quotes an identifier that has already passed validation.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Storage class of a character column, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCapacity {
    /// Capacity in characters.
    Varchar(usize),
    TinyText,
    Text,
    MediumText,
    LongText,
}

impl TextCapacity {
    /// Parses a live column type; `None` for anything that is not character data.
    pub fn parse(sql_type: &str) -> Option<Self> {
        let upper = sql_type.trim().to_ascii_uppercase();
        if let Some(rest) = upper
            .strip_prefix("VARCHAR(")
            .or_else(|| upper.strip_prefix("CHAR("))
        {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            return digits.parse().ok().map(TextCapacity::Varchar);
        }
        let base = upper.split_whitespace().next().unwrap_or_default();
        match base {
            "TINYTEXT" => Some(TextCapacity::TinyText),
            "TEXT" => Some(TextCapacity::Text),
            "MEDIUMTEXT" => Some(TextCapacity::MediumText),
            "LONGTEXT" => Some(TextCapacity::LongText),
            _ => None,
        }
    }

    /// Smallest capacity for text observed at `max_chars` characters and
    /// `max_bytes` UTF-8 bytes.
    pub fn for_lengths(max_chars: usize, max_bytes: usize) -> Self {
        if max_chars <= VARCHAR_MAX_CHARS {
            TextCapacity::Varchar(max_chars.max(1))
        } else {
            Self::tier_for_bytes(max_bytes)
        }
    }

    fn tier_for_bytes(max_bytes: usize) -> Self {
        if max_bytes <= TEXT_MAX_BYTES {
            TextCapacity::Text
        } else if max_bytes <= MEDIUMTEXT_MAX_BYTES {
            TextCapacity::MediumText
        } else {
            TextCapacity::LongText
        }
    }

    fn byte_limit(&self) -> Option<usize> {
        match self {
            TextCapacity::Varchar(_) => None,
            TextCapacity::TinyText => Some(TINYTEXT_MAX_BYTES),
            TextCapacity::Text => Some(TEXT_MAX_BYTES),
            TextCapacity::MediumText => Some(MEDIUMTEXT_MAX_BYTES),
            TextCapacity::LongText => None,
        }
    }

    pub fn fits(&self, max_chars: usize, max_bytes: usize) -> bool {
        match self {
            TextCapacity::Varchar(capacity) => max_chars <= *capacity,
            TextCapacity::LongText => true,
            tier => tier.byte_limit().is_some_and(|limit| max_bytes <= limit),
        }
    }

    /// Capacity needed to hold the observed lengths, or `None` when this one
    /// already does. The result is never smaller than `self`.
    pub fn widen_for(&self, max_chars: usize, max_bytes: usize) -> Option<Self> {
        if self.fits(max_chars, max_bytes) {
            return None;
        }
        let widened = match self {
            TextCapacity::Varchar(_) => Self::for_lengths(max_chars, max_bytes),
            _ => Self::tier_for_bytes(max_bytes),
        };
        Some(widened)
    }
}

impl fmt::Display for TextCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextCapacity::Varchar(n) => write!(f, "VARCHAR({n})"),
            TextCapacity::TinyText => f.write_str("TINYTEXT"),
            TextCapacity::Text => f.write_str("TEXT"),
            TextCapacity::MediumText => f.write_str("MEDIUMTEXT"),
            TextCapacity::LongText => f.write_str("LONGTEXT"),
        }
    }
}

/// A column as written into `CREATE TABLE` or `ALTER TABLE ... MODIFY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{} {} {}",
            quote_ident(&self.name),
            self.sql_type,
            if self.nullable { "NULL" } else { "NOT NULL" }
        )
    }
}

/// Schema-changing statements issued by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDefinition>,
    },
    ModifyColumn {
        table: String,
        column: ColumnDefinition,
    },
    Truncate {
        table: String,
    },
}

impl SchemaStatement {
    pub fn table(&self) -> &str {
        match self {
            SchemaStatement::CreateTable { table, .. }
            | SchemaStatement::ModifyColumn { table, .. }
            | SchemaStatement::Truncate { table } => table,
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            SchemaStatement::CreateTable { table, columns } => format!(
                "CREATE TABLE {} ({}) CHARACTER SET {TABLE_CHARSET} COLLATE {TABLE_COLLATION}",
                quote_ident(table),
                columns.iter().map(ColumnDefinition::render).join(", ")
            ),
            SchemaStatement::ModifyColumn { table, column } => format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                quote_ident(table),
                column.render()
            ),
            SchemaStatement::Truncate { table } => {
                format!("TRUNCATE TABLE {}", quote_ident(table))
            }
        }
    }
}

impl fmt::Display for SchemaStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// The single parameterised `INSERT` reused for every row of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    sql: String,
}

impl InsertStatement {
    /// Builds the statement after validating every identifier.
    pub fn new(table: &str, columns: &[String]) -> ImportResult<Self> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column)?;
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).join(", "),
            std::iter::repeat_n("?", columns.len()).join(", ")
        );
        Ok(Self {
            table: table.to_string(),
            columns: columns.to_vec(),
            sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}
