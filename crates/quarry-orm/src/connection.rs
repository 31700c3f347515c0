//! Pool-backed and transaction-bound connections.
//!
//! A [`Connection`] is one of two things for its whole life:
//!
//! - **pool-backed**: owns a [`SqlitePool`]; every call checks a connection
//!   out and hands it back when the call finishes, whatever the outcome;
//! - **transaction-bound**: wraps a [`TransactionHandle`] opened elsewhere;
//!   it never checks out, never releases and cannot begin another transaction.
//!
//! Checked-out connections are RAII guards, so release happens on every exit
//! path, including `?` and panics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quarry_sql::SqlValue;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{OrmError, Result};
use crate::record::Record;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Row id generated by the last INSERT on this connection.
    pub insert_id: i64,
    /// Rows changed by the statement.
    pub affected_rows: u64,
}

/// An open transaction on a connection checked out of a pool.
///
/// Handles are cheap to clone; every clone refers to the same transaction.
/// Once committed or rolled back the handle is spent, and any further use
/// returns [`OrmError::Connection`].
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<Mutex<Option<Transaction<'static, Sqlite>>>>,
}

impl TransactionHandle {
    fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Returns whether the transaction is still open.
    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    async fn take(&self) -> Result<Transaction<'static, Sqlite>> {
        self.inner.lock().await.take().ok_or_else(finished)
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

fn finished() -> OrmError {
    OrmError::Connection("transaction already committed or rolled back".into())
}

#[derive(Clone, Debug)]
enum Mode {
    Pool(SqlitePool),
    Transaction(TransactionHandle),
}

/// Executes parameterized statements against the database.
#[derive(Clone, Debug)]
pub struct Connection {
    mode: Mode,
}

impl Connection {
    /// Opens a pool from `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        debug!(url = %config.url, max = config.max_connections, "Opened connection pool");
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self {
            mode: Mode::Pool(pool),
        }
    }

    /// Wraps an open transaction. The result never touches the pool.
    #[must_use]
    pub const fn transaction_bound(handle: TransactionHandle) -> Self {
        Self {
            mode: Mode::Transaction(handle),
        }
    }

    /// Returns whether this connection wraps a transaction.
    #[must_use]
    pub const fn is_transaction_bound(&self) -> bool {
        matches!(self.mode, Mode::Transaction(_))
    }

    /// Returns the pool, if pool-backed.
    #[must_use]
    pub const fn pool(&self) -> Option<&SqlitePool> {
        match &self.mode {
            Mode::Pool(pool) => Some(pool),
            Mode::Transaction(_) => None,
        }
    }

    /// Runs a statement and returns its rows.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Record>> {
        debug!(sql = %sql, params = params.len(), "Executing query");
        let rows = match &self.mode {
            Mode::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                bind_params(sqlx::query(sql), params)
                    .fetch_all(&mut *conn)
                    .await?
            }
            Mode::Transaction(handle) => {
                let mut guard = handle.inner.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                bind_params(sqlx::query(sql), params)
                    .fetch_all(&mut **tx)
                    .await?
            }
        };
        rows.iter()
            .map(Record::from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(OrmError::from)
    }

    /// Runs a statement that returns no rows.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let result = match &self.mode {
            Mode::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                bind_params(sqlx::query(sql), params)
                    .execute(&mut *conn)
                    .await?
            }
            Mode::Transaction(handle) => {
                let mut guard = handle.inner.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                bind_params(sqlx::query(sql), params)
                    .execute(&mut **tx)
                    .await?
            }
        };
        Ok(ExecResult {
            insert_id: result.last_insert_rowid(),
            affected_rows: result.rows_affected(),
        })
    }

    /// Checks out a pooled connection and begins a transaction on it.
    ///
    /// Wrap the handle with [`Connection::transaction_bound`] to run
    /// statements inside it.
    pub async fn begin_transaction(&self) -> Result<TransactionHandle> {
        match &self.mode {
            Mode::Transaction(_) => Err(OrmError::Connection(
                "cannot begin a transaction on a transaction-bound connection".into(),
            )),
            Mode::Pool(pool) => {
                let tx = pool.begin().await?;
                debug!("Began transaction");
                Ok(TransactionHandle::new(tx))
            }
        }
    }

    /// Commits the transaction behind `handle`.
    pub async fn commit_transaction(&self, handle: &TransactionHandle) -> Result<()> {
        handle.take().await?.commit().await?;
        debug!("Committed transaction");
        Ok(())
    }

    /// Rolls back the transaction behind `handle`.
    pub async fn rollback_transaction(&self, handle: &TransactionHandle) -> Result<()> {
        handle.take().await?.rollback().await?;
        debug!("Rolled back transaction");
        Ok(())
    }

    /// Returns the connection behind `handle` to the pool.
    ///
    /// A transaction that was neither committed nor rolled back is rolled back
    /// by the driver. Does nothing on a transaction-bound connection, which
    /// never owns what it wraps.
    pub async fn release_connection(&self, handle: TransactionHandle) {
        if self.is_transaction_bound() {
            return;
        }
        if let Some(tx) = handle.inner.lock().await.take() {
            drop(tx);
            debug!("Released unfinished transaction");
        }
    }

    /// Closes the pool. Safe to call repeatedly and on transaction-bound
    /// connections, where it does nothing.
    pub async fn end(&self) {
        if let Mode::Pool(pool) = &self.mode {
            if !pool.is_closed() {
                pool.close().await;
                debug!("Closed connection pool");
            }
        }
    }
}

/// Binds parameters in order.
fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = bind_param(query, value.clone());
    }
    query
}

/// Binds a `SqlValue` parameter to a query.
fn bind_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_connection() -> Connection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        Connection::from_pool(pool)
    }

    #[tokio::test]
    async fn test_query_and_execute() {
        let conn = create_test_connection().await;
        conn.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, price REAL)",
            &[],
        )
        .await
        .unwrap();

        let result = conn
            .execute(
                "INSERT INTO items (name, price) VALUES (?, ?)",
                &[SqlValue::Text("pen".into()), SqlValue::Float(1.5)],
            )
            .await
            .unwrap();
        assert_eq!(result.insert_id, 1);
        assert_eq!(result.affected_rows, 1);

        let rows = conn
            .query("SELECT * FROM items WHERE name = ?", &[SqlValue::Text("pen".into())])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get("price"), Some(&SqlValue::Float(1.5)));
    }

    #[tokio::test]
    async fn test_driver_errors_propagate_and_release() {
        let conn = create_test_connection().await;
        let err = conn.query("SELECT * FROM missing_table", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::Database(_)));

        // The single pooled connection must have been handed back.
        let rows = conn.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rows[0].get_i64("one"), Some(1));
    }

    #[tokio::test]
    async fn test_nested_transaction_rejected() {
        let conn = create_test_connection().await;
        let handle = conn.begin_transaction().await.unwrap();
        let tx = Connection::transaction_bound(handle.clone());
        assert!(tx.is_transaction_bound());

        let err = tx.begin_transaction().await.unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));

        conn.rollback_transaction(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_spent_handle() {
        let conn = create_test_connection().await;
        let handle = conn.begin_transaction().await.unwrap();
        conn.commit_transaction(&handle).await.unwrap();
        assert!(!handle.is_open().await);

        let err = conn.commit_transaction(&handle).await.unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));

        let tx = Connection::transaction_bound(handle);
        let err = tx.query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let conn = create_test_connection().await;
        conn.end().await;
        conn.end().await;
        assert!(conn.pool().unwrap().is_closed());

        let conn = create_test_connection().await;
        let handle = conn.begin_transaction().await.unwrap();
        let tx = Connection::transaction_bound(handle.clone());
        tx.end().await;
        assert!(tx.pool().is_none());
        conn.release_connection(handle).await;
    }
}
