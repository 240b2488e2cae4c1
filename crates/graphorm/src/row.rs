//! Result rows as ordered column/value pairs.

use crate::value::Value;
use std::sync::Arc;

/// One result row.
///
/// Column names are shared between the rows of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from a shared column list and its values.
    ///
    /// Missing trailing values are padded with [`Value::Null`].
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column with this name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value at a column index.
    pub fn value(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_keeps_order() {
        let row = Row::from_pairs([("Id", Value::Int(7)), ("Name", Value::from("Ada"))]);
        let cols: Vec<_> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(cols, ["Id", "Name"]);
        assert_eq!(row.get("Name"), Some(&Value::from("Ada")));
        assert_eq!(row.get("Missing"), None);
    }

    #[test]
    fn new_pads_missing_values() {
        let cols: Arc<[String]> = vec!["A".to_string(), "B".to_string()].into();
        let row = Row::new(cols, vec![Value::Int(1)]);
        assert_eq!(row.value(1), Some(&Value::Null));
    }
}
