//! The generic row shape.
//!
//! Query results, insert payloads and partial updates are all [`Record`]s: a
//! column-name to [`SqlValue`] map. Keys are kept sorted, so iterating a
//! record always yields columns and values in the same order.

use std::collections::btree_map::{self, BTreeMap};

use quarry_sql::{SqlValue, ToSqlValue};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// A row as a column → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, SqlValue>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with<T: ToSqlValue>(mut self, column: impl Into<String>, value: T) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, returning the previous value.
    pub fn set<T: ToSqlValue>(&mut self, column: impl Into<String>, value: T) -> Option<SqlValue> {
        self.values.insert(column.into(), value.to_sql_value())
    }

    /// Returns a column's value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// Returns a column as an integer.
    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Returns a column as text.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        self.values.remove(column)
    }

    /// Returns whether the column is present (even if NULL).
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Values in iteration order (the same order as [`Record::keys`]).
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.values.values()
    }

    /// `(column, value)` pairs in iteration order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, SqlValue> {
        self.values.iter()
    }

    /// Overwrites this record's columns with every column of `other`.
    pub fn merge(&mut self, other: &Self) {
        for (column, value) in other {
            self.values.insert(column.clone(), value.clone());
        }
    }

    /// Decodes a driver row, keeping SQLite's storage class of each value.
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let mut record = Self::new();
        for (i, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(i)?;
            let value = if raw.is_null() {
                SqlValue::Null
            } else {
                let storage = raw.type_info().name().to_ascii_uppercase();
                match storage.as_str() {
                    "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(i)?),
                    "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(i)?),
                    "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                    _ => SqlValue::Text(row.try_get_unchecked::<String, _>(i)?),
                }
            };
            record.values.insert(column.name().to_string(), value);
        }
        Ok(record)
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a SqlValue);
    type IntoIter = btree_map::Iter<'a, String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl IntoIterator for Record {
    type Item = (String, SqlValue);
    type IntoIter = btree_map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_and_values_line_up() {
        let record = Record::new()
            .with("name", "x")
            .with("age", 3)
            .with("email", "x@example.com");
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["age", "email", "name"]);
        let first = record.values().next().cloned();
        assert_eq!(first, Some(SqlValue::Int(3)));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = Record::new().with("name", "old").with("age", 1);
        base.merge(&Record::new().with("name", "new"));
        assert_eq!(base.get_str("name"), Some("new"));
        assert_eq!(base.get_i64("age"), Some(1));
    }

    #[test]
    fn test_null_column_is_present() {
        let record = Record::new().with("deleted_at", None::<String>);
        assert!(record.contains("deleted_at"));
        assert_eq!(record.get("deleted_at"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_from_iterator() {
        let record: Record = vec![("a", SqlValue::Int(1)), ("b", SqlValue::Null)]
            .into_iter()
            .collect();
        assert_eq!(record.len(), 2);
    }
}
