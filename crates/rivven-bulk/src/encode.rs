//! Value encoding shared by both write strategies
//!
//! A single total function turns a [`Value`] into the bytes that end up on
//! the wire, so `LOAD DATA` and `replace into` agree on NULL and blob
//! handling.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::types::{Row, Table, Value};

/// Literal written for SQL NULL
pub const NULL_LITERAL: &str = "NULL";

/// Encode a single value as text.
///
/// - `Null` becomes the bare `NULL` literal
/// - `Text` is used as-is
/// - `Blob` bytes are written raw
/// - `Unsupported` fails with [`Error::TypeConversion`]
pub fn encode_value(value: &Value) -> Result<Cow<'_, [u8]>> {
    match value {
        Value::Null => Ok(Cow::Borrowed(NULL_LITERAL.as_bytes())),
        Value::Text(s) => Ok(Cow::Borrowed(s.as_bytes())),
        Value::Blob(b) => Ok(Cow::Borrowed(b.as_slice())),
        Value::Unsupported { type_name } => Err(Error::type_conversion(format!(
            "cannot encode value of type '{}' as text",
            type_name
        ))),
    }
}

/// Encode a row's fields in the table's column order.
///
/// Columns absent from the row are encoded as NULL.
pub fn encode_row<'a>(table: &Table, row: &'a Row) -> Result<Vec<Cow<'a, [u8]>>> {
    table
        .columns
        .iter()
        .map(|column| match row.get(column) {
            Some(value) => encode_value(value).map_err(|e| {
                Error::type_conversion(format!("column '{}' of '{}': {}", column, table.name, e))
            }),
            None => Ok(Cow::Borrowed(NULL_LITERAL.as_bytes())),
        })
        .collect()
}

/// Encode a row as one CSV record for `LOAD DATA`.
///
/// Fields are comma separated and enclosed in `"` only when needed, with
/// embedded quotes doubled. `NULL` is never enclosed so the server reads it
/// as SQL NULL. The record ends with `\n`.
pub fn encode_record(table: &Table, row: &Row) -> Result<Vec<u8>> {
    let fields = encode_row(table, row)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(64));

    writer
        .write_record(&fields)
        .map_err(|e| Error::type_conversion(format!("failed to encode record: {}", e)))?;

    writer
        .into_inner()
        .map_err(|e| Error::internal(format!("failed to flush record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new("t", vec!["a".into(), "b".into()])
    }

    #[test]
    fn test_encode_value() {
        assert_eq!(encode_value(&Value::Null).unwrap().as_ref(), b"NULL");
        assert_eq!(encode_value(&Value::from("x,y")).unwrap().as_ref(), b"x,y");
        assert_eq!(
            encode_value(&Value::Blob(vec![0xde, 0xad])).unwrap().as_ref(),
            &[0xde_u8, 0xad][..]
        );
    }

    #[test]
    fn test_encode_unsupported_is_typed_error() {
        let err = encode_value(&Value::unsupported("geometry")).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::TypeConversion);
        assert!(err.to_string().contains("geometry"));
    }

    #[test]
    fn test_encode_row_orders_and_fills_missing() {
        let row = Row::new().with("b", "2");
        let fields = encode_row(&table(), &row).unwrap();
        assert_eq!(fields[0].as_ref(), b"NULL");
        assert_eq!(fields[1].as_ref(), b"2");
    }

    #[test]
    fn test_encode_record_quotes_when_needed() {
        let row = Row::new().with("a", "he said \"hi\", twice").with("b", "plain");
        let record = encode_record(&table(), &row).unwrap();
        assert_eq!(record, b"\"he said \"\"hi\"\", twice\",plain\n");
    }

    #[test]
    fn test_encode_record_null_unquoted() {
        let row = Row::new().with("a", None::<String>).with("b", "line\nbreak");
        let record = encode_record(&table(), &row).unwrap();
        assert_eq!(record, b"NULL,\"line\nbreak\"\n");
    }
}
