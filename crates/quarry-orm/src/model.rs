//! Per-table CRUD with lifecycle hooks.
//!
//! A [`Model`] is bound to one table and one [`Connection`]. Reads go through
//! a fresh [`Query`] per call; mutations run the registered hooks around the
//! statement.
//!
//! ```no_run
//! # async fn demo(conn: quarry_orm::Connection) -> quarry_orm::Result<()> {
//! use quarry_orm::{HookEvent, Model, Record};
//!
//! let mut users = Model::new("users", conn);
//! users.add_hook(HookEvent::BeforeCreate, |user| {
//!     Box::pin(async move {
//!         user.set("role", "member");
//!         Ok(())
//!     })
//! });
//!
//! let user = users.create(Record::new().with("name", "ann")).await?;
//! let again = users.find_by_id(user.get_i64("id").unwrap_or_default()).await?;
//! assert!(again.is_some());
//! # Ok(())
//! # }
//! ```

use futures::future::BoxFuture;
use quarry_sql::{Query, SqlValue, ToSqlValue};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::hooks::{HookEvent, Hooks};
use crate::record::Record;

/// Default primary key column.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// A CRUD façade over one table.
#[derive(Debug, Clone)]
pub struct Model {
    table: String,
    primary_key: String,
    connection: Connection,
    hooks: Hooks,
}

impl Model {
    /// Creates a model for `table` whose primary key is `id`.
    pub fn new(table: impl Into<String>, connection: Connection) -> Self {
        Self {
            table: table.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            connection,
            hooks: Hooks::default(),
        }
    }

    /// Overrides the primary key column.
    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Returns a copy bound to `connection`, keeping the registered hooks.
    ///
    /// Pass a transaction-bound connection to run this model's operations
    /// inside that transaction.
    #[must_use]
    pub fn using(&self, connection: Connection) -> Self {
        Self {
            connection,
            ..self.clone()
        }
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the primary key column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the bound connection.
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Appends a hook for `event`.
    pub fn add_hook<F>(&mut self, event: HookEvent, hook: F)
    where
        F: for<'a> Fn(&'a mut Record) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.add(event, hook);
    }

    /// Returns a fresh query on this model's table.
    pub fn query(&self) -> Query {
        Query::table(self.table.as_str())
    }

    /// Fetches the row whose primary key is `id`.
    pub async fn find_by_id<T: ToSqlValue>(&self, id: T) -> Result<Option<Record>> {
        self.query()
            .where_eq(self.primary_key.as_str(), id)
            .first(&self.connection)
            .await
    }

    /// Fetches every row of the table.
    pub async fn find_all(&self) -> Result<Vec<Record>> {
        self.query().get(&self.connection).await
    }

    /// Inserts `data` and returns the inserted row.
    ///
    /// `before_create` hooks may change the draft; the INSERT writes exactly
    /// the columns present after they ran. The primary key is set from the
    /// generated row id only when the draft has no key or a NULL key.
    pub async fn create(&self, data: Record) -> Result<Record> {
        let mut draft = data;
        self.hooks.run(HookEvent::BeforeCreate, &mut draft).await?;

        let sql = if draft.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            let columns: Vec<&str> = draft.keys().collect();
            let placeholders = vec![SqlValue::placeholder(); columns.len()];
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let params: Vec<SqlValue> = draft.values().cloned().collect();

        let generated_key = draft
            .get(self.primary_key.as_str())
            .map_or(true, SqlValue::is_null);

        let result = self.connection.execute(&sql, &params).await?;
        debug!(table = %self.table, id = result.insert_id, "Created record");
        if generated_key {
            draft.set(self.primary_key.as_str(), result.insert_id);
        }

        self.hooks.run(HookEvent::AfterCreate, &mut draft).await?;
        Ok(draft)
    }

    /// Applies `partial` to the row whose primary key is `id`.
    ///
    /// Returns `false` when the row does not exist or `partial` is empty.
    /// `before_update` hooks see the existing row with `partial` merged over
    /// it; the UPDATE writes only the columns of `partial`.
    pub async fn update<T: ToSqlValue>(&self, id: T, partial: Record) -> Result<bool> {
        if partial.is_empty() {
            return Ok(false);
        }
        let id = id.to_sql_value();
        let Some(mut merged) = self.find_by_id(id.clone()).await? else {
            return Ok(false);
        };
        merged.merge(&partial);
        self.hooks.run(HookEvent::BeforeUpdate, &mut merged).await?;

        let assignments: Vec<String> = partial
            .keys()
            .map(|column| format!("{column} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            assignments.join(", "),
            self.primary_key
        );
        let mut params: Vec<SqlValue> = partial.values().cloned().collect();
        params.push(id);

        let result = self.connection.execute(&sql, &params).await?;
        debug!(table = %self.table, affected = result.affected_rows, "Updated record");
        if result.affected_rows > 0 {
            self.hooks.run(HookEvent::AfterUpdate, &mut merged).await?;
        }
        Ok(result.affected_rows > 0)
    }

    /// Deletes the row whose primary key is `id`.
    ///
    /// Returns `false` when the row does not exist.
    pub async fn delete<T: ToSqlValue>(&self, id: T) -> Result<bool> {
        let id = id.to_sql_value();
        let Some(mut existing) = self.find_by_id(id.clone()).await? else {
            return Ok(false);
        };
        self.hooks.run(HookEvent::BeforeDelete, &mut existing).await?;

        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, self.primary_key);
        let result = self.connection.execute(&sql, &[id]).await?;
        debug!(table = %self.table, affected = result.affected_rows, "Deleted record");
        if result.affected_rows > 0 {
            self.hooks.run(HookEvent::AfterDelete, &mut existing).await?;
        }
        Ok(result.affected_rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn users() -> Model {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let conn = Connection::from_pool(pool);
        conn.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT)",
            &[],
        )
        .await
        .unwrap();
        Model::new("users", conn)
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let users = users().await;
        let created = users.create(Record::new().with("name", "x")).await.unwrap();
        let id = created.get_i64("id").unwrap();

        let found = users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.get_str("name"), Some("x"));
        assert_eq!(found.get("email"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_create_empty_record() {
        let users = users().await;
        let created = users.create(Record::new()).await.unwrap();
        assert_eq!(created.get_i64("id"), Some(1));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows() {
        let users = users().await;
        assert!(!users.update(42, Record::new().with("name", "y")).await.unwrap());
        assert!(!users.delete(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_with_empty_partial() {
        let users = users().await;
        users.create(Record::new().with("name", "x")).await.unwrap();
        assert!(!users.update(1, Record::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_primary_key() {
        let model = users().await;
        model
            .connection()
            .execute("CREATE TABLE tags (tag_id INTEGER PRIMARY KEY, label TEXT)", &[])
            .await
            .unwrap();
        let tags = Model::new("tags", model.connection().clone()).with_primary_key("tag_id");

        let tag = tags.create(Record::new().with("label", "rust")).await.unwrap();
        assert_eq!(tag.get_i64("tag_id"), Some(1));
        assert!(tags.update(1, Record::new().with("label", "sql")).await.unwrap());
        let found = tags.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.get_str("label"), Some("sql"));
    }
}
