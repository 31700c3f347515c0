//! Schema introspection for tooling.

use serde::{Deserialize, Serialize};

use quarry_sql::SqlValue;

use crate::connection::Connection;
use crate::error::Result;

/// One column as the database reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, as written in the table definition.
    pub native_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// `PRI` for primary key columns.
    pub key: Option<String>,
    /// Default expression, verbatim.
    pub default: Option<String>,
    /// `AUTOINCREMENT` for an auto-incrementing primary key.
    pub extra: Option<String>,
}

/// Lists tables and their columns.
#[allow(async_fn_in_trait)]
pub trait Introspector {
    /// User tables, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of `table` in declaration order. Unknown tables have none.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;
}

/// Reads `sqlite_master` and `pragma_table_info`.
#[derive(Debug, Clone)]
pub struct SqliteIntrospector {
    connection: Connection,
    ignored: Vec<String>,
}

impl SqliteIntrospector {
    /// Creates an introspector that reports every user table.
    pub const fn new(connection: Connection) -> Self {
        Self {
            connection,
            ignored: Vec::new(),
        }
    }

    /// Hides `table` from [`Introspector::list_tables`].
    #[must_use]
    pub fn ignoring(mut self, table: impl Into<String>) -> Self {
        self.ignored.push(table.into());
        self
    }
}

impl Introspector for SqliteIntrospector {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .connection
            .query(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_str("name"))
            .filter(|name| !self.ignored.iter().any(|ignored| ignored == name))
            .map(str::to_string)
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let definition = self
            .connection
            .query(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[SqlValue::Text(table.to_string())],
            )
            .await?;
        let autoincrement = definition
            .first()
            .and_then(|row| row.get_str("sql"))
            .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

        let rows = self
            .connection
            .query(
                "SELECT name, type, \"notnull\" AS not_null, dflt_value, pk \
                 FROM pragma_table_info(?) ORDER BY cid",
                &[SqlValue::Text(table.to_string())],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let primary = row.get_i64("pk").unwrap_or(0) > 0;
                ColumnInfo {
                    name: row.get_str("name").unwrap_or_default().to_string(),
                    native_type: row.get_str("type").unwrap_or_default().to_string(),
                    nullable: row.get_i64("not_null").unwrap_or(0) == 0 && !primary,
                    key: primary.then(|| "PRI".to_string()),
                    default: row.get("dflt_value").and_then(|value| match value {
                        SqlValue::Null => None,
                        SqlValue::Text(text) => Some(text.clone()),
                        other => Some(other.to_string()),
                    }),
                    extra: (primary && autoincrement).then(|| "AUTOINCREMENT".to_string()),
                }
            })
            .collect())
    }
}
