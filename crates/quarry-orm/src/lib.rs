//! # quarry-orm
//!
//! Runs [`quarry_sql`] queries against SQLite and layers per-table CRUD on
//! top of them.
//!
//! This crate provides:
//! - [`Connection`], either pool-backed or bound to one open transaction
//! - [`Fetch`], the terminal operations (`get`, `first`, `count`, `sum`, `avg`)
//!   for [`Query`]
//! - [`Model`], a CRUD façade with `before_*`/`after_*` lifecycle hooks
//! - [`Record`], the column → value map every row is read into
//! - [`DatabaseConfig`] for pool settings, from code, environment or JSON
//! - [`SqliteIntrospector`] for listing tables and columns
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry_orm::{Connection, DatabaseConfig, Fetch, Model, Query, Record};
//!
//! async fn example() -> quarry_orm::Result<()> {
//!     let conn = Connection::connect(&DatabaseConfig::new("sqlite:app.db")).await?;
//!
//!     let users = Model::new("users", conn.clone());
//!     let ann = users.create(Record::new().with("name", "ann").with("age", 31)).await?;
//!
//!     let adults = Query::table("users")
//!         .where_("age", ">=", 18)
//!         .order_by("name")
//!         .get(&conn)
//!         .await?;
//!     let total = Query::table("users").count(&conn, "*").await?;
//!
//!     # let _ = (ann, adults, total);
//!     conn.end().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```no_run
//! use quarry_orm::{Connection, Model, Record};
//!
//! async fn transfer(conn: &Connection, accounts: &Model) -> quarry_orm::Result<()> {
//!     let handle = conn.begin_transaction().await?;
//!     let tx = Connection::transaction_bound(handle.clone());
//!     let accounts = accounts.using(tx);
//!
//!     let moved = accounts.update(1, Record::new().with("balance", 0)).await;
//!     match moved {
//!         Ok(_) => conn.commit_transaction(&handle).await?,
//!         Err(_) => conn.rollback_transaction(&handle).await?,
//!     }
//!     conn.release_connection(handle).await;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod fetch;
mod hooks;
pub mod introspect;
mod model;
mod record;

pub use config::{DatabaseConfig, DATABASE_URL_ENV, MAX_CONNECTIONS_ENV};
pub use connection::{Connection, ExecResult, TransactionHandle};
pub use error::{OrmError, Result};
pub use fetch::Fetch;
pub use hooks::{HookEvent, HookFn, Hooks};
pub use introspect::{ColumnInfo, Introspector, SqliteIntrospector};
pub use model::{Model, DEFAULT_PRIMARY_KEY};
pub use record::Record;

// Re-export the builder so callers need only this crate.
pub use quarry_sql::{BuildError, Direction, JoinKind, Query, SqlValue, ToSqlValue};
