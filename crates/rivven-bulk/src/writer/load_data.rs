//! Streaming `LOAD DATA LOCAL INFILE` writer
//!
//! Rows are encoded as CSV and pushed through an in-memory pipe while the
//! server reads the other end as a virtual local file:
//!
//! ```text
//! row channel ──► encoder ──► duplex pipe ──► InfileSource ──► LOAD DATA
//! ```
//!
//! The pipe is the only synchronisation between the two sides. A full pipe
//! blocks the encoder until the server catches up, so memory use is bounded
//! by the pipe capacity.

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use super::BatchWriter;
use crate::connection::{InfileSource, Transaction};
use crate::dialect::{load_data_statement, virtual_file_name, DISABLE_FOREIGN_KEY_CHECKS};
use crate::encode::encode_record;
use crate::error::{Error, Result};
use crate::types::{RowReceiver, Table};

/// Writes batches with `LOAD DATA CONCURRENT LOCAL INFILE`
#[derive(Debug, Clone)]
pub struct LoadDataWriter {
    pipe_capacity: usize,
}

impl LoadDataWriter {
    /// Create a writer whose pipe buffers at most `pipe_capacity` bytes
    pub fn new(pipe_capacity: usize) -> Self {
        Self {
            pipe_capacity: pipe_capacity.max(1),
        }
    }

    /// Pipe capacity in bytes
    pub fn pipe_capacity(&self) -> usize {
        self.pipe_capacity
    }
}

impl Default for LoadDataWriter {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

#[async_trait]
impl BatchWriter for LoadDataWriter {
    async fn write_batch(
        &self,
        tx: &dyn Transaction,
        table: &Table,
        rows: &mut RowReceiver,
        cap: u64,
    ) -> Result<u64> {
        let sql = load_data_statement(table);

        tx.execute(DISABLE_FOREIGN_KEY_CHECKS).await?;

        let (reader, writer) = tokio::io::duplex(self.pipe_capacity);
        let source = InfileSource::new(virtual_file_name(&table.name), reader);

        // Fires once the statement returns. If the server rejected the load
        // without draining the pipe, the encoder would otherwise block forever.
        let statement_done = CancellationToken::new();
        let done = &statement_done;
        let sql = sql.as_str();

        let producer = async move {
            tokio::select! {
                biased;
                streamed = stream_records(table, rows, cap, writer) => streamed,
                _ = done.cancelled() => Err(Error::internal(
                    "LOAD DATA returned before the row stream was fully written",
                )),
            }
        };

        let consumer = async move {
            let loaded = tx.load_data(sql, source).await;
            done.cancel();
            loaded
        };

        let (streamed, loaded) = tokio::join!(producer, consumer);

        // the statement error explains a broken pipe, so report it first
        let affected = loaded?;
        let written = streamed?;

        trace!(
            table = %table.name,
            written,
            affected,
            "LOAD DATA batch streamed"
        );

        Ok(written)
    }

    fn name(&self) -> &'static str {
        "load_data"
    }

    fn requires_local_infile(&self) -> bool {
        true
    }
}

/// Encode up to `cap` rows into the pipe, then close it.
///
/// Returning (on success or error) drops the write end, which the server
/// sees as end of file.
async fn stream_records(
    table: &Table,
    rows: &mut RowReceiver,
    cap: u64,
    mut pipe: DuplexStream,
) -> Result<u64> {
    let mut streamed = 0u64;

    while streamed < cap {
        let Some(row) = rows.recv().await else {
            break;
        };

        let record = match encode_record(table, &row) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    table = %table.name,
                    row = streamed,
                    error = %e,
                    "Failed to encode row, closing LOAD DATA stream"
                );
                return Err(e);
            }
        };

        pipe.write_all(&record)
            .await
            .map_err(|e| Error::io("failed to write record to LOAD DATA pipe", e))?;

        streamed += 1;
    }

    pipe.shutdown()
        .await
        .map_err(|e| Error::io("failed to close LOAD DATA pipe", e))?;

    Ok(streamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    fn table() -> Table {
        Table::new("t", vec!["id".into(), "name".into()])
    }

    #[tokio::test]
    async fn test_stream_records_respects_cap() {
        let (tx, mut rx) = mpsc::channel(8);
        for i in 0..5 {
            tx.send(Row::new().with("id", i.to_string()).with("name", "n"))
                .await
                .unwrap();
        }
        drop(tx);

        let (mut reader, writer) = tokio::io::duplex(1024);
        let streamed = stream_records(&table(), &mut rx, 3, writer).await.unwrap();
        assert_eq!(streamed, 3);

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "0,n\n1,n\n2,n\n");

        // remaining rows stay in the channel for the next batch
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_records_stops_on_unsupported_value() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(Row::new().with("id", "1")).await.unwrap();
        tx.send(Row::new().with("id", crate::types::Value::unsupported("json")))
            .await
            .unwrap();
        drop(tx);

        let (mut reader, writer) = tokio::io::duplex(1024);
        let err = stream_records(&table(), &mut rx, 10, writer)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("json"));

        // first record made it through before the pipe was closed
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "1,NULL\n");
    }
}
