//! Row model
//!
//! A query result row is an ordered column-name list plus one
//! column-to-text mapping. The column list is captured once per statement,
//! before the first row, and shared by every row of that statement. SQL
//! NULL is always represented by the fixed [`NULL_VALUE`] sentinel, never
//! by a missing key.

use std::collections::HashMap;
use std::sync::Arc;

/// Fixed marker for SQL NULL column values.
pub const NULL_VALUE: &str = "NULL";

/// One query result row.
///
/// Owned solely by the consumer once delivered; cloning is cheap for the
/// shared column list and linear in the row's values.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column names in statement order, shared across the statement's rows.
    columns: Arc<[String]>,
    /// Column name to text value; NULL carries the sentinel.
    values: HashMap<String, String>,
}

impl Row {
    /// Build a row from the statement's shared column list and the raw
    /// cell values of the current step, `None` meaning SQL NULL.
    pub(crate) fn new(columns: Arc<[String]>, cells: Vec<Option<String>>) -> Self {
        let values = columns
            .iter()
            .cloned()
            .zip(
                cells
                    .into_iter()
                    .map(|cell| cell.unwrap_or_else(|| NULL_VALUE.to_string())),
            )
            .collect();
        Self { columns, values }
    }

    /// Column names in statement order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Text value of a column. `Some` for every column of the statement,
    /// with [`NULL_VALUE`] standing in for SQL NULL; `None` only for
    /// names that are not columns of this row.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Whether the column holds SQL NULL.
    pub fn is_null(&self, column: &str) -> bool {
        self.get(column) == Some(NULL_VALUE)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the statement produced zero columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|n| n.to_string()).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_values_keyed_by_column_name() {
        let row = Row::new(
            columns(&["id", "v"]),
            vec![Some("1".to_string()), Some("a".to_string())],
        );

        assert_eq!(row.get("id"), Some("1"));
        assert_eq!(row.get("v"), Some("a"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
    }

    #[test]
    fn test_null_uses_sentinel_not_omission() {
        let row = Row::new(columns(&["id", "v"]), vec![Some("1".to_string()), None]);

        // The key is present and carries the sentinel.
        assert_eq!(row.get("v"), Some(NULL_VALUE));
        assert!(row.is_null("v"));
        assert!(!row.is_null("id"));
    }

    #[test]
    fn test_column_order_preserved() {
        let row = Row::new(
            columns(&["b", "a", "c"]),
            vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string()),
            ],
        );

        assert_eq!(row.columns(), &["b", "a", "c"]);
    }
}
