//! Boolean predicate trees.
//!
//! A WHERE clause (and a callback-built JOIN ... ON clause) is an ordered
//! sequence of [`Predicate`] nodes. Each node carries the conjunction that
//! links it to its left-hand sibling; the conjunction of the first node in a
//! sequence is never rendered.
//!
//! Rendering is a depth-first, left-to-right walk that pushes parameters in
//! exactly the order their placeholders appear in the text, so the output can
//! be bound positionally.

use std::fmt;

use crate::value::SqlValue;

/// The conjunction linking a predicate to its preceding sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Boolean {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// The right-hand side of a basic comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// One placeholder: `col op ?`.
    Value(SqlValue),
    /// One placeholder per element: `col IN (?, ?)`. May be empty.
    List(Vec<SqlValue>),
    /// Two placeholders, min then max: `col BETWEEN ? AND ?`.
    Range(SqlValue, SqlValue),
    /// No placeholder: `col IS NULL`.
    None,
}

impl Operand {
    /// Number of placeholders this operand renders.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        match self {
            Self::Value(_) => 1,
            Self::List(values) => values.len(),
            Self::Range(..) => 2,
            Self::None => 0,
        }
    }
}

/// A node in a predicate sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A single column comparison.
    Basic {
        /// Column (or qualified column) on the left-hand side.
        column: String,
        /// Operator text, emitted verbatim (`=`, `>`, `LIKE`, `IN`, ...).
        operator: String,
        /// Right-hand side.
        operand: Operand,
        /// Conjunction with the previous sibling.
        boolean: Boolean,
    },
    /// A parenthesized nested sequence.
    Group {
        /// Conjunction with the previous sibling.
        boolean: Boolean,
        /// The nested predicates, in order.
        children: Vec<Predicate>,
    },
    /// Trusted, caller-supplied SQL with its own parameters.
    Raw {
        /// SQL fragment, emitted verbatim inside parentheses.
        sql: String,
        /// Parameters for the fragment's placeholders.
        params: Vec<SqlValue>,
        /// Conjunction with the previous sibling.
        boolean: Boolean,
    },
}

impl Predicate {
    /// Returns the node's conjunction.
    #[must_use]
    pub const fn boolean(&self) -> Boolean {
        match self {
            Self::Basic { boolean, .. }
            | Self::Group { boolean, .. }
            | Self::Raw { boolean, .. } => *boolean,
        }
    }

    fn render_into(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Self::Basic {
                column,
                operator,
                operand,
                ..
            } => {
                sql.push_str(column);
                sql.push(' ');
                sql.push_str(operator);
                match operand {
                    Operand::Value(value) => {
                        sql.push_str(" ?");
                        params.push(value.clone());
                    }
                    Operand::List(values) => {
                        let placeholders = vec![SqlValue::placeholder(); values.len()];
                        sql.push_str(" (");
                        sql.push_str(&placeholders.join(", "));
                        sql.push(')');
                        params.extend(values.iter().cloned());
                    }
                    Operand::Range(min, max) => {
                        sql.push_str(" ? AND ?");
                        params.push(min.clone());
                        params.push(max.clone());
                    }
                    Operand::None => {}
                }
            }
            Self::Group { children, .. } => {
                sql.push('(');
                render_sequence_into(children, sql, params);
                sql.push(')');
            }
            Self::Raw {
                sql: fragment,
                params: fragment_params,
                ..
            } => {
                sql.push('(');
                sql.push_str(fragment);
                sql.push(')');
                params.extend(fragment_params.iter().cloned());
            }
        }
    }
}

fn render_sequence_into(predicates: &[Predicate], sql: &mut String, params: &mut Vec<SqlValue>) {
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            sql.push(' ');
            sql.push_str(predicate.boolean().as_sql());
            sql.push(' ');
        }
        predicate.render_into(sql, params);
    }
}

/// Renders a predicate sequence to SQL text plus its parameters.
///
/// An empty sequence renders as an empty string with no parameters.
#[must_use]
pub fn render(predicates: &[Predicate]) -> (String, Vec<SqlValue>) {
    let mut sql = String::new();
    let mut params = Vec::new();
    render_sequence_into(predicates, &mut sql, &mut params);
    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(column: &str, operator: &str, value: i64, boolean: Boolean) -> Predicate {
        Predicate::Basic {
            column: column.to_string(),
            operator: operator.to_string(),
            operand: Operand::Value(SqlValue::Int(value)),
            boolean,
        }
    }

    #[test]
    fn test_first_boolean_is_not_rendered() {
        let (sql, params) = render(&[basic("a", "=", 1, Boolean::Or)]);
        assert_eq!(sql, "a = ?");
        assert_eq!(params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_sibling_booleans() {
        let (sql, params) = render(&[
            basic("a", "=", 1, Boolean::And),
            basic("b", ">", 2, Boolean::Or),
            basic("c", "<", 3, Boolean::And),
        ]);
        assert_eq!(sql, "a = ? OR b > ? AND c < ?");
        assert_eq!(
            params,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_nested_groups_keep_depth_first_order() {
        let tree = vec![
            basic("a", "=", 1, Boolean::And),
            Predicate::Group {
                boolean: Boolean::And,
                children: vec![
                    basic("b", "=", 2, Boolean::And),
                    Predicate::Group {
                        boolean: Boolean::Or,
                        children: vec![
                            basic("c", "=", 3, Boolean::And),
                            basic("d", "=", 4, Boolean::And),
                        ],
                    },
                ],
            },
            basic("e", "=", 5, Boolean::Or),
        ];

        let (sql, params) = render(&tree);
        assert_eq!(sql, "a = ? AND (b = ? OR (c = ? AND d = ?)) OR e = ?");
        let ints: Vec<i64> = params.iter().filter_map(SqlValue::as_i64).collect();
        assert_eq!(ints, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_operand_shapes() {
        let tree = vec![
            Predicate::Basic {
                column: "id".into(),
                operator: "IN".into(),
                operand: Operand::List(vec![SqlValue::Int(1), SqlValue::Int(2)]),
                boolean: Boolean::And,
            },
            Predicate::Basic {
                column: "age".into(),
                operator: "NOT BETWEEN".into(),
                operand: Operand::Range(SqlValue::Int(10), SqlValue::Int(20)),
                boolean: Boolean::And,
            },
            Predicate::Basic {
                column: "deleted_at".into(),
                operator: "IS NULL".into(),
                operand: Operand::None,
                boolean: Boolean::Or,
            },
        ];

        let (sql, params) = render(&tree);
        assert_eq!(
            sql,
            "id IN (?, ?) AND age NOT BETWEEN ? AND ? OR deleted_at IS NULL"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_empty_list_renders_degenerate_in() {
        let (sql, params) = render(&[Predicate::Basic {
            column: "id".into(),
            operator: "IN".into(),
            operand: Operand::List(vec![]),
            boolean: Boolean::And,
        }]);
        assert_eq!(sql, "id IN ()");
        assert!(params.is_empty());
    }

    #[test]
    fn test_raw_is_parenthesized() {
        let (sql, params) = render(&[
            basic("a", "=", 1, Boolean::And),
            Predicate::Raw {
                sql: "score * ? > 10".into(),
                params: vec![SqlValue::Float(1.5)],
                boolean: Boolean::Or,
            },
        ]);
        assert_eq!(sql, "a = ? OR (score * ? > 10)");
        assert_eq!(params, vec![SqlValue::Int(1), SqlValue::Float(1.5)]);
    }

    #[test]
    fn test_empty_sequence() {
        let (sql, params) = render(&[]);
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }
}
