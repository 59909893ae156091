//! Upstream row source contract
//!
//! The loader does not read or anonymise data itself. An extractor
//! implements [`RowSource`] and hands over each table's rows through a
//! bounded channel that is closed once the table is exhausted.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RowReceiver;

/// Supplies table layouts and row streams
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Column names of `table`, in load order
    async fn columns(&self, table: &str) -> Result<Vec<String>>;

    /// Row stream of `table`; the channel closes when all rows were sent
    async fn rows(&self, table: &str) -> Result<RowReceiver>;
}
