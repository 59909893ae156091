//! Value and row types for rivven-bulk
//!
//! Rows arrive from the upstream extractor as column-name keyed maps whose
//! values are one of a small set of tagged variants:
//! - SQL NULL
//! - Text (already rendered by the extractor)
//! - Binary blobs
//! - Unsupported values the extractor could not render

use std::collections::HashMap;
use tokio::sync::mpsc;

/// Field value produced by the row source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Text value
    Text(String),
    /// Raw bytes (BLOB, VARBINARY)
    Blob(Vec<u8>),
    /// A value of a type that has no text rendering
    Unsupported {
        /// Name of the source type, for diagnostics
        type_name: String,
    },
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Create an unsupported value marker
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::Unsupported {
            type_name: type_name.into(),
        }
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Unsupported { type_name } => type_name,
        }
    }

    /// Try to get the text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get the raw bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::Blob(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Blob(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// A row keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Number of columns present in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, Value>> for Row {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Receiving end of a table's row stream; closed once the source is exhausted
pub type RowReceiver = mpsc::Receiver<Row>;

/// Sending end of a table's row stream
pub type RowSender = mpsc::Sender<Row>;

/// Target table layout, fixed for the duration of a table load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Column names in load order
    pub columns: Vec<String>,
}

impl Table {
    /// Create a table layout
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("a"), Value::Text("a".into()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Blob(vec![1, 2]));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::unsupported("decimal").kind(), "decimal");
    }

    #[test]
    fn test_row_builder() {
        let row = Row::new().with("id", "1").with("name", None::<String>);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id").and_then(Value::as_str), Some("1"));
        assert!(row.get("name").is_some_and(Value::is_null));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_row_from_iter() {
        let row: Row = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(row.get("b").and_then(Value::as_str), Some("2"));
    }
}
