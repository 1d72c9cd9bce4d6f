//! SQL differences between the supported backends.
//!
//! Statements are written once with `$N` placeholders, which both backends
//! accept, and the fragments that differ are taken from [`Dialect`].

use std::fmt;

use crate::error::{Result, SqlDbError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Picks the dialect from the scheme of a connection URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let scheme = uri
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| SqlDbError::Config(format!("connection URI has no scheme: {uri:?}")))?;
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SqlDbError::Config(format!("unsupported database scheme: {other}"))),
        }
    }

    pub fn serial_key(self) -> &'static str {
        match self {
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    pub fn timestamp_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "TIMESTAMPTZ",
            Dialect::Sqlite => "DATETIME",
        }
    }

    pub fn json_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "JSONB",
            Dialect::Sqlite => "TEXT",
        }
    }

    pub fn now(self) -> &'static str {
        match self {
            Dialect::Postgres => "NOW()",
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
        }
    }

    /// Converts an integer parameter holding unix seconds to a timestamp.
    pub fn from_unixtime(self, param: usize) -> String {
        match self {
            Dialect::Postgres => format!("TO_TIMESTAMP(CAST(${param} AS DOUBLE PRECISION))"),
            Dialect::Sqlite => format!("datetime(${param}, 'unixepoch')"),
        }
    }

    /// Placeholder for a parameter carrying JSON text.
    pub fn json_param(self, param: usize) -> String {
        match self {
            Dialect::Postgres => format!("${param}::jsonb"),
            Dialect::Sqlite => format!("${param}"),
        }
    }

    /// Reads a JSON column back as text.
    pub fn json_text(self, column: &str) -> String {
        match self {
            Dialect::Postgres => format!("{column}::text"),
            Dialect::Sqlite => column.to_string(),
        }
    }

    /// Like [`Dialect::json_text`], with NULL read back as an empty string.
    pub fn json_text_or_empty(self, column: &str) -> String {
        format!("COALESCE({}, '')", self.json_text(column))
    }

    /// Builds an insert that replaces the row when `key` already exists.
    /// `values` holds one SQL expression per column, usually placeholders.
    pub fn upsert(self, table: &str, key: &[&str], columns: &[&str], values: &[String]) -> String {
        let column_list = columns.join(", ");
        let value_list = values.join(", ");
        match self {
            Dialect::Postgres => {
                let updates = columns
                    .iter()
                    .filter(|c| !key.contains(c))
                    .map(|c| format!("{c} = EXCLUDED.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {table} ({column_list}) VALUES ({value_list}) ON CONFLICT ({}) DO UPDATE SET {updates}",
                    key.join(", ")
                )
            }
            Dialect::Sqlite => format!("INSERT OR REPLACE INTO {table} ({column_list}) VALUES ({value_list})"),
        }
    }

    pub fn drop_table(self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("DROP TABLE IF EXISTS {table} CASCADE"),
            Dialect::Sqlite => format!("DROP TABLE IF EXISTS {table}"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}
