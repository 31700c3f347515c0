//! Terminal operations on a compiled [`Query`].
//!
//! Each method compiles the query (or a modified copy of it) and performs
//! exactly one round trip through a [`Connection`].

use quarry_sql::{Query, SqlValue};

use crate::connection::Connection;
use crate::error::Result;
use crate::record::Record;

/// Field name aggregate queries alias their result to.
const AGGREGATE_ALIAS: &str = "aggregate";

/// Executes a query through a connection.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// Returns every matching row.
    async fn get(&self, conn: &Connection) -> Result<Vec<Record>>;

    /// Returns the first matching row, or `None` when nothing matches.
    async fn first(&self, conn: &Connection) -> Result<Option<Record>>;

    /// Returns `COUNT(column)` over the matching rows.
    async fn count(&self, conn: &Connection, column: &str) -> Result<i64>;

    /// Returns `SUM(column)`, or 0 when there is nothing to sum.
    async fn sum(&self, conn: &Connection, column: &str) -> Result<f64>;

    /// Returns `AVG(column)`, or 0 when there is nothing to average.
    async fn avg(&self, conn: &Connection, column: &str) -> Result<f64>;
}

impl Fetch for Query {
    async fn get(&self, conn: &Connection) -> Result<Vec<Record>> {
        let (sql, params) = self.build_sql();
        conn.query(&sql, &params).await
    }

    async fn first(&self, conn: &Connection) -> Result<Option<Record>> {
        let (sql, params) = self.clone().limit(1).build_sql();
        Ok(conn.query(&sql, &params).await?.into_iter().next())
    }

    async fn count(&self, conn: &Connection, column: &str) -> Result<i64> {
        let value = aggregate(self, conn, "COUNT", column).await?;
        Ok(value.as_ref().and_then(SqlValue::as_i64).unwrap_or(0))
    }

    async fn sum(&self, conn: &Connection, column: &str) -> Result<f64> {
        let value = aggregate(self, conn, "SUM", column).await?;
        Ok(value.as_ref().and_then(SqlValue::as_f64).unwrap_or(0.0))
    }

    async fn avg(&self, conn: &Connection, column: &str) -> Result<f64> {
        let value = aggregate(self, conn, "AVG", column).await?;
        Ok(value.as_ref().and_then(SqlValue::as_f64).unwrap_or(0.0))
    }
}

/// Runs `FUNC(column) AS aggregate` over a copy of `query` and returns the
/// scalar from the first row.
async fn aggregate(
    query: &Query,
    conn: &Connection,
    function: &str,
    column: &str,
) -> Result<Option<SqlValue>> {
    let expr = format!("{function}({column}) AS {AGGREGATE_ALIAS}");
    let (sql, params) = query.clone().select(&[expr.as_str()]).build_sql();
    let mut rows = conn.query(&sql, &params).await?;
    Ok(if rows.is_empty() {
        None
    } else {
        rows.swap_remove(0).remove(AGGREGATE_ALIAS)
    })
}
