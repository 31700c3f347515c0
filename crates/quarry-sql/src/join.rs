//! JOIN clauses.

use std::fmt;

use crate::value::SqlValue;

/// The kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

impl JoinKind {
    /// Returns the SQL keyword (without `JOIN`).
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A compiled join: the ON clause is already SQL plus parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined table (may include an alias).
    pub table: String,
    /// Rendered ON condition.
    pub on_sql: String,
    /// Parameters for the ON condition, in placeholder order.
    pub on_params: Vec<SqlValue>,
}

impl Join {
    /// Appends `<KIND> JOIN <table> ON <on>` to `sql` and the ON parameters to
    /// `params`.
    pub fn render_into(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        sql.push(' ');
        sql.push_str(self.kind.as_sql());
        sql.push_str(" JOIN ");
        sql.push_str(&self.table);
        sql.push_str(" ON ");
        sql.push_str(&self.on_sql);
        params.extend(self.on_params.iter().cloned());
    }
}
