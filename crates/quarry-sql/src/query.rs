//! The SELECT query builder.
//!
//! A [`Query`] accumulates a plan through chained calls and compiles it with
//! [`Query::build_sql`]. Compilation is a pure function of the plan: it can be
//! called any number of times and never mutates the builder.

use std::fmt;

use crate::error::{BuildError, Result};
use crate::join::{Join, JoinKind};
use crate::predicate::{self, Boolean, Operand, Predicate};
use crate::value::{SqlValue, ToSqlValue};

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending order (ASC)
    #[default]
    Asc,
    /// Descending order (DESC)
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A HAVING condition. Conditions are always AND-joined and always bind
/// exactly one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    /// Column or aggregate expression.
    pub column: String,
    /// Operator, emitted verbatim.
    pub operator: String,
    /// Bound value.
    pub value: SqlValue,
}

/// A SELECT query plan over a single table.
///
/// Chaining methods consume and return the builder. Join methods that can
/// reject their arguments return [`Result`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    joins: Vec<Join>,
    group_by: Vec<String>,
    having: Vec<Having>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

fn all_columns() -> Vec<String> {
    vec![String::from("*")]
}

/// Fits a single comparison value to the placeholder shape of `operator`.
fn scalar_operand(operator: &str, value: SqlValue) -> Operand {
    let normalized = operator
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    match normalized.as_str() {
        "IS NULL" | "IS NOT NULL" => Operand::None,
        "IN" | "NOT IN" => Operand::List(vec![value]),
        "BETWEEN" | "NOT BETWEEN" => Operand::Range(value.clone(), value),
        _ => Operand::Value(value),
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn bound(n: u64) -> SqlValue {
    if n > i64::MAX as u64 {
        SqlValue::Int(i64::MAX)
    } else {
        SqlValue::Int(n as i64)
    }
}

impl Query {
    /// Creates an empty plan selecting `*` from `table`.
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: all_columns(),
            predicates: Vec::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Returns the table this query reads from.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Returns the current select list.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the top-level predicate sequence.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns whether no WHERE predicate has been added.
    #[must_use]
    pub fn is_empty_where(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns the joins in declaration order.
    #[must_use]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Returns the limit, if set.
    #[must_use]
    pub const fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Replaces the select list. An empty slice resets it to `*`.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = if columns.is_empty() {
            all_columns()
        } else {
            columns.iter().map(|c| String::from(*c)).collect()
        };
        self
    }

    // WHERE: basic comparisons

    fn push_basic(
        mut self,
        boolean: Boolean,
        column: impl Into<String>,
        operator: impl Into<String>,
        operand: Operand,
    ) -> Self {
        self.predicates.push(Predicate::Basic {
            column: column.into(),
            operator: operator.into(),
            operand,
            boolean,
        });
        self
    }

    /// Adds `column operator ?`, AND-joined.
    ///
    /// `IS NULL` and `IS NOT NULL` bind nothing and ignore `value`. `IN` and
    /// `NOT IN` bind a one-element list. `BETWEEN` and `NOT BETWEEN` bind
    /// `value` as both bounds.
    #[must_use]
    pub fn where_<T: ToSqlValue>(
        self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: T,
    ) -> Self {
        let operator = operator.into();
        let operand = scalar_operand(&operator, value.to_sql_value());
        self.push_basic(Boolean::And, column, operator, operand)
    }

    /// Adds `column = ?`, AND-joined.
    #[must_use]
    pub fn where_eq<T: ToSqlValue>(self, column: impl Into<String>, value: T) -> Self {
        self.where_(column, "=", value)
    }

    /// Adds `column operator ?`, OR-joined. Operators are shaped as in
    /// [`Query::where_`].
    #[must_use]
    pub fn or_where<T: ToSqlValue>(
        self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: T,
    ) -> Self {
        let operator = operator.into();
        let operand = scalar_operand(&operator, value.to_sql_value());
        self.push_basic(Boolean::Or, column, operator, operand)
    }

    // WHERE: nested groups

    fn push_group<F>(mut self, boolean: Boolean, scope: &str, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let nested = build(Self::table(scope));
        if !nested.predicates.is_empty() {
            self.predicates.push(Predicate::Group {
                boolean,
                children: nested.predicates,
            });
        }
        self
    }

    /// Adds a parenthesized group, AND-joined.
    ///
    /// The closure receives a fresh query scoped to the same table; whatever
    /// predicates it accumulates become the group. An empty group is dropped.
    #[must_use]
    pub fn where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let scope = self.table.clone();
        self.push_group(Boolean::And, &scope, build)
    }

    /// Adds a parenthesized group, OR-joined.
    #[must_use]
    pub fn or_where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let scope = self.table.clone();
        self.push_group(Boolean::Or, &scope, build)
    }

    // WHERE: IN / NOT IN

    fn push_list<I, T>(
        self,
        boolean: Boolean,
        column: impl Into<String>,
        negated: bool,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        let operator = if negated { "NOT IN" } else { "IN" };
        let values = values.into_iter().map(ToSqlValue::to_sql_value).collect();
        self.push_basic(boolean, column, operator, Operand::List(values))
    }

    /// Adds `column IN (?, ...)`, AND-joined. An empty list renders `IN ()`.
    #[must_use]
    pub fn where_in<I, T>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        self.push_list(Boolean::And, column, false, values)
    }

    /// Adds `column IN (?, ...)`, OR-joined.
    #[must_use]
    pub fn or_where_in<I, T>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        self.push_list(Boolean::Or, column, false, values)
    }

    /// Adds `column NOT IN (?, ...)`, AND-joined.
    #[must_use]
    pub fn where_not_in<I, T>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        self.push_list(Boolean::And, column, true, values)
    }

    /// Adds `column NOT IN (?, ...)`, OR-joined.
    #[must_use]
    pub fn or_where_not_in<I, T>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        self.push_list(Boolean::Or, column, true, values)
    }

    // WHERE: NULL checks

    /// Adds `column IS NULL`, AND-joined.
    #[must_use]
    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.push_basic(Boolean::And, column, "IS NULL", Operand::None)
    }

    /// Adds `column IS NULL`, OR-joined.
    #[must_use]
    pub fn or_where_null(self, column: impl Into<String>) -> Self {
        self.push_basic(Boolean::Or, column, "IS NULL", Operand::None)
    }

    /// Adds `column IS NOT NULL`, AND-joined.
    #[must_use]
    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.push_basic(Boolean::And, column, "IS NOT NULL", Operand::None)
    }

    /// Adds `column IS NOT NULL`, OR-joined.
    #[must_use]
    pub fn or_where_not_null(self, column: impl Into<String>) -> Self {
        self.push_basic(Boolean::Or, column, "IS NOT NULL", Operand::None)
    }

    // WHERE: ranges

    fn push_range<L: ToSqlValue, H: ToSqlValue>(
        self,
        boolean: Boolean,
        column: impl Into<String>,
        negated: bool,
        min: L,
        max: H,
    ) -> Self {
        let operator = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        self.push_basic(
            boolean,
            column,
            operator,
            Operand::Range(min.to_sql_value(), max.to_sql_value()),
        )
    }

    /// Adds `column BETWEEN ? AND ?` (min, max), AND-joined.
    #[must_use]
    pub fn where_between<L: ToSqlValue, H: ToSqlValue>(
        self,
        column: impl Into<String>,
        min: L,
        max: H,
    ) -> Self {
        self.push_range(Boolean::And, column, false, min, max)
    }

    /// Adds `column BETWEEN ? AND ?`, OR-joined.
    #[must_use]
    pub fn or_where_between<L: ToSqlValue, H: ToSqlValue>(
        self,
        column: impl Into<String>,
        min: L,
        max: H,
    ) -> Self {
        self.push_range(Boolean::Or, column, false, min, max)
    }

    /// Adds `column NOT BETWEEN ? AND ?`, AND-joined.
    #[must_use]
    pub fn where_not_between<L: ToSqlValue, H: ToSqlValue>(
        self,
        column: impl Into<String>,
        min: L,
        max: H,
    ) -> Self {
        self.push_range(Boolean::And, column, true, min, max)
    }

    /// Adds `column NOT BETWEEN ? AND ?`, OR-joined.
    #[must_use]
    pub fn or_where_not_between<L: ToSqlValue, H: ToSqlValue>(
        self,
        column: impl Into<String>,
        min: L,
        max: H,
    ) -> Self {
        self.push_range(Boolean::Or, column, true, min, max)
    }

    // WHERE: raw fragments

    fn push_raw(
        mut self,
        boolean: Boolean,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Self {
        self.predicates.push(Predicate::Raw {
            sql: sql.into(),
            params,
            boolean,
        });
        self
    }

    /// Adds a trusted SQL fragment, parenthesized, AND-joined.
    ///
    /// The fragment is not validated; `params` are bound in order.
    #[must_use]
    pub fn where_raw(self, sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.push_raw(Boolean::And, sql, params)
    }

    /// Adds a trusted SQL fragment, parenthesized, OR-joined.
    #[must_use]
    pub fn or_where_raw(self, sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.push_raw(Boolean::Or, sql, params)
    }

    /// Adds a column-to-column comparison, AND-joined.
    ///
    /// Meant for JOIN callbacks (`users.id = posts.user_id`); nothing is bound.
    #[must_use]
    pub fn on(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_raw(Boolean::And, format!("{first} {operator} {second}"), Vec::new())
    }

    /// Adds a column-to-column comparison, OR-joined.
    #[must_use]
    pub fn or_on(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_raw(Boolean::Or, format!("{first} {operator} {second}"), Vec::new())
    }

    // JOIN

    fn push_join_columns(
        mut self,
        kind: JoinKind,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        if table.trim().is_empty() {
            return Err(BuildError::Configuration(format!(
                "{kind} JOIN requires a table name"
            )));
        }
        if [first, operator, second].iter().any(|part| part.trim().is_empty()) {
            return Err(BuildError::Configuration(format!(
                "{kind} JOIN on `{table}` requires a first column, an operator and a second column"
            )));
        }
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on_sql: format!("{first} {operator} {second}"),
            on_params: Vec::new(),
        });
        Ok(self)
    }

    fn push_join_scoped<F>(mut self, kind: JoinKind, table: &str, build: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Self,
    {
        let nested = build(Self::table(table));
        if nested.predicates.is_empty() {
            return Err(BuildError::Configuration(format!(
                "{kind} JOIN on `{table}` produced an empty ON clause"
            )));
        }
        let (on_sql, on_params) = predicate::render(&nested.predicates);
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on_sql,
            on_params,
        });
        Ok(self)
    }

    /// Adds `INNER JOIN table ON first operator second`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the table or any of the three
    /// comparison parts is empty.
    pub fn inner_join(
        self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        self.push_join_columns(JoinKind::Inner, table, first, operator, second)
    }

    /// Adds `LEFT JOIN table ON first operator second`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the table or any of the three
    /// comparison parts is empty.
    pub fn left_join(
        self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        self.push_join_columns(JoinKind::Left, table, first, operator, second)
    }

    /// Adds `RIGHT JOIN table ON first operator second`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the table or any of the three
    /// comparison parts is empty.
    pub fn right_join(
        self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        self.push_join_columns(JoinKind::Right, table, first, operator, second)
    }

    /// Adds an INNER JOIN whose ON clause is built by a closure.
    ///
    /// The closure receives a fresh query scoped to the joined table; its
    /// predicates are compiled into the ON clause.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the closure adds no predicates.
    pub fn inner_join_on<F>(self, table: &str, build: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Self,
    {
        self.push_join_scoped(JoinKind::Inner, table, build)
    }

    /// Adds a LEFT JOIN whose ON clause is built by a closure.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the closure adds no predicates.
    pub fn left_join_on<F>(self, table: &str, build: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Self,
    {
        self.push_join_scoped(JoinKind::Left, table, build)
    }

    /// Adds a RIGHT JOIN whose ON clause is built by a closure.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the closure adds no predicates.
    pub fn right_join_on<F>(self, table: &str, build: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Self,
    {
        self.push_join_scoped(JoinKind::Right, table, build)
    }

    /// Adds a join with a trusted ON fragment and its parameters.
    #[must_use]
    pub fn join_raw(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        on_sql: impl Into<String>,
        on_params: Vec<SqlValue>,
    ) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on_sql: on_sql.into(),
            on_params,
        });
        self
    }

    // Grouping, ordering, paging

    /// Replaces the GROUP BY columns.
    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by = columns.iter().map(|c| String::from(*c)).collect();
        self
    }

    /// Appends an AND-joined HAVING condition binding one parameter.
    #[must_use]
    pub fn having<T: ToSqlValue>(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: T,
    ) -> Self {
        self.having.push(Having {
            column: column.into(),
            operator: operator.into(),
            value: value.to_sql_value(),
        });
        self
    }

    /// Appends an ascending ORDER BY column.
    #[must_use]
    pub fn order_by(self, column: impl Into<String>) -> Self {
        self.order_by_with(column, Direction::Asc)
    }

    /// Appends a descending ORDER BY column.
    #[must_use]
    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by_with(column, Direction::Desc)
    }

    /// Appends an ORDER BY column with an explicit direction.
    #[must_use]
    pub fn order_by_with(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub const fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Compiles the plan to SQL text and its positional parameters.
    ///
    /// Parameters appear in exactly the order of their `?` placeholders.
    #[must_use]
    pub fn build_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            join.render_into(&mut sql, &mut params);
        }

        if !self.predicates.is_empty() {
            let (where_sql, where_params) = predicate::render(&self.predicates);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having.is_empty() {
            let conditions: Vec<String> = self
                .having
                .iter()
                .map(|h| format!("{} {} ?", h.column, h.operator))
                .collect();
            sql.push_str(" HAVING ");
            sql.push_str(&conditions.join(" AND "));
            params.extend(self.having.iter().map(|h| h.value.clone()));
        }

        if !self.order_by.is_empty() {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(bound(n));
        }

        if let Some(n) = self.offset {
            sql.push_str(" OFFSET ?");
            params.push(bound(n));
        }

        (sql, params)
    }
}
