//! Batch write strategies
//!
//! A strategy consumes up to `cap` rows from a table's row stream inside a
//! transaction opened by the loader and reports how many rows it wrote. It
//! never commits or rolls back; that is the loader's job.

use async_trait::async_trait;

use crate::config::{LoaderConfig, WriteStrategy};
use crate::connection::Transaction;
use crate::error::Result;
use crate::types::{RowReceiver, Table};

pub mod load_data;
pub mod replace;

pub use load_data::LoadDataWriter;
pub use replace::ReplaceWriter;

/// Writes one batch of rows within a caller-owned transaction
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Consume at most `cap` rows from `rows` and write them through `tx`.
    ///
    /// Returns the number of rows written. A count below `cap` means the
    /// row stream is exhausted.
    async fn write_batch(
        &self,
        tx: &dyn Transaction,
        table: &Table,
        rows: &mut RowReceiver,
        cap: u64,
    ) -> Result<u64>;

    /// Strategy name, used in logs
    fn name(&self) -> &'static str;

    /// Whether the server must allow `LOAD DATA LOCAL INFILE`
    fn requires_local_infile(&self) -> bool {
        false
    }
}

/// Build the writer for the configured strategy
pub fn writer_for(config: &LoaderConfig) -> Box<dyn BatchWriter> {
    match config.strategy {
        WriteStrategy::LoadData => Box::new(LoadDataWriter::new(config.pipe_capacity)),
        WriteStrategy::Replace => Box::new(ReplaceWriter::new(config.replace_buffer_capacity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_for_strategy() {
        let config = LoaderConfig::default();
        assert_eq!(writer_for(&config).name(), "load_data");
        assert!(writer_for(&config).requires_local_infile());

        let config = config.with_strategy(WriteStrategy::Replace);
        assert_eq!(writer_for(&config).name(), "replace");
        assert!(!writer_for(&config).requires_local_infile());
    }
}
