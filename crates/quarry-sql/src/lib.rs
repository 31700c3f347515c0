//! # quarry-sql
//!
//! A fluent SELECT builder that compiles a chain of method calls into
//! parameterized SQL.
//!
//! This crate provides:
//! - [`Query`], which accumulates a query plan (columns, a boolean predicate
//!   tree, joins, grouping, ordering, paging)
//! - [`Predicate`], the tagged predicate tree and its depth-first renderer
//! - [`SqlValue`] and [`ToSqlValue`] for positional parameters
//!
//! The crate is driver-free: compiling a query is a pure function of its plan.
//! Execution lives in `quarry-orm`.
//!
//! ## Example
//!
//! ```rust
//! use quarry_sql::{Query, SqlValue};
//!
//! let (sql, params) = Query::table("users")
//!     .where_("age", ">", 18)
//!     .or_where("vip", "=", true)
//!     .where_in("status", ["active", "pending"])
//!     .build_sql();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM users WHERE age > ? OR vip = ? AND status IN (?, ?)"
//! );
//! assert_eq!(params[0], SqlValue::Int(18));
//! assert_eq!(params.len(), 4);
//! ```
//!
//! ## Nested groups
//!
//! ```rust
//! use quarry_sql::Query;
//!
//! let (sql, _) = Query::table("users")
//!     .where_eq("active", true)
//!     .where_group(|q| q.where_null("banned_at").or_where("role", "=", "admin"))
//!     .build_sql();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM users WHERE active = ? AND (banned_at IS NULL OR role = ?)"
//! );
//! ```

mod error;
mod join;
pub mod predicate;
mod query;
pub mod value;

pub use error::{BuildError, Result};
pub use join::{Join, JoinKind};
pub use predicate::{Boolean, Operand, Predicate};
pub use query::{Direction, Having, Query};
pub use value::{SqlValue, ToSqlValue};
