//! Migration history tracking.
//!
//! This module manages the `quarry_migrations` ledger: one row per applied
//! migration, keyed by its unique name.

use chrono::{DateTime, NaiveDateTime, Utc};
use quarry_orm::{Connection, Record, SqlValue};

use crate::error::Result;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "quarry_migrations";

/// SQL to create the ledger table.
pub const CREATE_LEDGER_SQL: &str = r"
CREATE TABLE IF NOT EXISTS quarry_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    ran_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Unique ID in the ledger.
    pub id: i64,
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub ran_at: DateTime<Utc>,
}

impl AppliedMigration {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.get_i64("id").unwrap_or_default(),
            name: record.get_str("name").unwrap_or_default().to_string(),
            ran_at: parse_timestamp(record.get_str("ran_at").unwrap_or_default()),
        }
    }
}

/// Parses the ledger's timestamp column, falling back to now when unreadable.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Reads and writes the ledger through a [`Connection`].
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    connection: Connection,
}

impl MigrationHistory {
    /// Creates a new ledger manager.
    pub const fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Creates the ledger table if it does not exist.
    pub async fn ensure_ledger(&self) -> Result<()> {
        self.connection.execute(CREATE_LEDGER_SQL, &[]).await?;
        Ok(())
    }

    /// All applied migrations, sorted ascending by name.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>> {
        let rows = self
            .connection
            .query(
                "SELECT id, name, ran_at FROM quarry_migrations ORDER BY name ASC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(AppliedMigration::from_record).collect())
    }

    /// Names of applied migrations, sorted ascending.
    pub async fn applied_names(&self) -> Result<Vec<String>> {
        Ok(self.applied().await?.into_iter().map(|m| m.name).collect())
    }

    /// Records `name` as applied.
    pub async fn record_applied(&self, name: &str) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO quarry_migrations (name) VALUES (?)",
                &[SqlValue::Text(name.to_string())],
            )
            .await?;
        Ok(())
    }

    /// Removes `name` from the ledger. Returns whether a row was removed.
    pub async fn record_rolled_back(&self, name: &str) -> Result<bool> {
        let result = self
            .connection
            .execute(
                "DELETE FROM quarry_migrations WHERE name = ?",
                &[SqlValue::Text(name.to_string())],
            )
            .await?;
        Ok(result.affected_rows > 0)
    }

    /// Checks if `name` has been applied.
    pub async fn is_applied(&self, name: &str) -> Result<bool> {
        let rows = self
            .connection
            .query(
                "SELECT 1 AS applied FROM quarry_migrations WHERE name = ?",
                &[SqlValue::Text(name.to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_history() -> MigrationHistory {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        MigrationHistory::new(Connection::from_pool(pool))
    }

    #[tokio::test]
    async fn test_ensure_ledger_is_idempotent() {
        let history = create_test_history().await;
        history.ensure_ledger().await.unwrap();
        history.ensure_ledger().await.unwrap();
        assert!(history.applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_query() {
        let history = create_test_history().await;
        history.ensure_ledger().await.unwrap();

        history.record_applied("20240102000000_b").await.unwrap();
        history.record_applied("20240101000000_a").await.unwrap();

        assert!(history.is_applied("20240101000000_a").await.unwrap());
        assert!(!history.is_applied("20240103000000_c").await.unwrap());
        assert_eq!(
            history.applied_names().await.unwrap(),
            vec!["20240101000000_a", "20240102000000_b"]
        );

        let applied = history.applied().await.unwrap();
        assert_eq!(applied[0].id, 2);
        assert!(applied[0].ran_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let history = create_test_history().await;
        history.ensure_ledger().await.unwrap();
        history.record_applied("20240101000000_a").await.unwrap();
        assert!(history.record_applied("20240101000000_a").await.is_err());
    }

    #[tokio::test]
    async fn test_record_rolled_back() {
        let history = create_test_history().await;
        history.ensure_ledger().await.unwrap();
        history.record_applied("20240101000000_a").await.unwrap();

        assert!(history.record_rolled_back("20240101000000_a").await.unwrap());
        assert!(!history.record_rolled_back("20240101000000_a").await.unwrap());
        assert!(!history.is_applied("20240101000000_a").await.unwrap());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let sqlite = parse_timestamp("2024-03-01 12:30:00");
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:00+00:00");
        let rfc = parse_timestamp("2024-03-01T12:30:00Z");
        assert_eq!(rfc, sqlite);
    }
}
