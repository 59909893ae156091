//! Buffered `replace into` writer
//!
//! Builds a single multi-row statement in memory:
//!
//! ```text
//! replace into users values (1,'a'),(2,'b'),...
//! ```
//!
//! # Unescaped input
//!
//! Field values are spliced into the statement verbatim. The row source is
//! expected to hand over values that are already valid SQL literals (quoted
//! strings, numbers, `NULL`). A text value such as `a,b` is emitted as two
//! bare tokens. Unlike [`LoadDataWriter`](super::LoadDataWriter), nothing is
//! escaped, and the table name is not quoted.

use async_trait::async_trait;
use tracing::trace;

use super::BatchWriter;
use crate::connection::Transaction;
use crate::dialect::{replace_statement_prefix, DISABLE_FOREIGN_KEY_CHECKS};
use crate::encode::encode_row;
use crate::error::Result;
use crate::types::{Row, RowReceiver, Table};

/// Writes batches with one `replace into ... values` statement
#[derive(Debug, Clone)]
pub struct ReplaceWriter {
    buffer_capacity: usize,
}

impl ReplaceWriter {
    /// Create a writer that reserves `buffer_capacity` bytes per statement.
    ///
    /// The capacity is a hint only; rows keep being appended past it.
    pub fn new(buffer_capacity: usize) -> Self {
        Self { buffer_capacity }
    }

    /// Statement buffer capacity hint in bytes
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Append `(v1,v2,...)` for one row
    fn push_row(statement: &mut Vec<u8>, table: &Table, row: &Row) -> Result<()> {
        let fields = encode_row(table, row)?;

        statement.push(b'(');
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                statement.push(b',');
            }
            statement.extend_from_slice(field);
        }
        statement.push(b')');
        Ok(())
    }
}

impl Default for ReplaceWriter {
    fn default() -> Self {
        Self::new(1024 * 1024 + 1024)
    }
}

#[async_trait]
impl BatchWriter for ReplaceWriter {
    async fn write_batch(
        &self,
        tx: &dyn Transaction,
        table: &Table,
        rows: &mut RowReceiver,
        cap: u64,
    ) -> Result<u64> {
        let mut statement = Vec::with_capacity(self.buffer_capacity);
        statement.extend_from_slice(replace_statement_prefix(table).as_bytes());

        let mut inserted = 0u64;
        while inserted < cap {
            let Some(row) = rows.recv().await else {
                break;
            };
            if inserted != 0 {
                statement.push(b',');
            }
            Self::push_row(&mut statement, table, &row)?;
            inserted += 1;
        }

        if inserted == 0 {
            return Ok(0);
        }

        trace!(
            table = %table.name,
            rows = inserted,
            bytes = statement.len(),
            "Executing replace batch"
        );

        tx.execute(DISABLE_FOREIGN_KEY_CHECKS).await?;
        tx.execute_raw(statement).await?;

        Ok(inserted)
    }

    fn name(&self) -> &'static str {
        "replace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_push_row_is_verbatim() {
        let table = Table::new("t", vec!["a".into(), "b".into(), "c".into()]);
        let row = Row::new()
            .with("a", "'x,y'")
            .with("b", None::<String>)
            .with("c", Value::Blob(b"0x01".to_vec()));

        let mut statement = Vec::new();
        ReplaceWriter::push_row(&mut statement, &table, &row).unwrap();
        assert_eq!(statement, b"('x,y',NULL,0x01)");
    }

    #[test]
    fn test_capacity_hint() {
        assert_eq!(ReplaceWriter::default().buffer_capacity(), 1_049_600);
    }
}
