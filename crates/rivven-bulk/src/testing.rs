//! Testing utilities
//!
//! In-memory stand-ins for the target database and the upstream extractor,
//! so loaders can be exercised without a MySQL server.
//!
//! [`MockConnection`] behaves like a server with a global `local_infile`
//! setting: `LOAD DATA` is refused while the setting is off, streamed files
//! are parsed back into rows, and rows only become visible once their
//! transaction commits. Failures can be injected per transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_bulk::testing::*;
//!
//! let conn = MockConnection::new();
//! let source = MockRowSource::new().with_table("users", &["id", "name"], numbered_rows(2500));
//!
//! let loader = BulkLoader::new(Arc::new(conn.clone()), Arc::new(source), LoaderConfig::default())?;
//! let summary = loader.load_table("users").await?;
//!
//! assert_eq!(summary.batches, vec![1000, 1000, 500]);
//! assert_eq!(conn.committed_rows("users").len(), 2500);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::connection::{Connection, InfileSource, Transaction};
use crate::dialect::{
    unquote_identifier, DISABLE_LOCAL_INFILE, ENABLE_LOCAL_INFILE, LOCAL_INFILE_QUERY,
};
use crate::encode::NULL_LITERAL;
use crate::error::{Error, Result};
use crate::types::{Row, RowReceiver};

/// A row as the mock server stored it; `None` is SQL NULL
pub type StoredRow = Vec<Option<String>>;

// ============================================================================
// Mock Connection
// ============================================================================

/// Final state of a mock transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Neither committed nor rolled back yet
    Open,
    /// Committed, rows are visible
    Committed,
    /// Rolled back, rows discarded
    RolledBack,
    /// Commit was attempted and failed, rows discarded
    CommitFailed,
}

/// Everything that happened inside one transaction
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// Statements executed, in order (raw statements decoded lossily)
    pub statements: Vec<String>,
    /// Rows written by the transaction, per table
    pub rows: Vec<(String, StoredRow)>,
    /// How the transaction ended
    pub outcome: TransactionOutcome,
}

impl TransactionRecord {
    /// Number of rows the transaction wrote
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Default)]
struct MockState {
    local_infile: bool,
    local_infile_queries: usize,
    statements: Vec<String>,
    transactions: Vec<TransactionRecord>,
    committed: HashMap<String, Vec<StoredRow>>,
    closed: bool,

    fail_begin: Option<String>,
    fail_write_on: Option<usize>,
    fail_commit_on: Option<usize>,
    fail_local_infile_query: Option<String>,
    fail_restore: bool,
    fail_close: bool,
}

/// A mock MySQL server
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    /// Create a server with `local_infile` switched off
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial server-wide `local_infile` value
    pub fn with_local_infile(self, enabled: bool) -> Self {
        self.state.lock().local_infile = enabled;
        self
    }

    /// Fail the row write (`LOAD DATA` or `replace`) of the `n`th transaction (1-based).
    ///
    /// A failing `LOAD DATA` returns without reading its source, like a
    /// server rejecting the statement up front.
    pub fn fail_write_on(self, n: usize) -> Self {
        self.state.lock().fail_write_on = Some(n);
        self
    }

    /// Fail the commit of the `n`th transaction (1-based)
    pub fn fail_commit_on(self, n: usize) -> Self {
        self.state.lock().fail_commit_on = Some(n);
        self
    }

    /// Fail every `begin`
    pub fn fail_begin(self, message: impl Into<String>) -> Self {
        self.state.lock().fail_begin = Some(message.into());
        self
    }

    /// Fail the `local_infile` lookup
    pub fn fail_local_infile_query(self, message: impl Into<String>) -> Self {
        self.state.lock().fail_local_infile_query = Some(message.into());
        self
    }

    /// Fail `SET GLOBAL local_infile=0`
    pub fn fail_restore(self) -> Self {
        self.state.lock().fail_restore = true;
        self
    }

    /// Fail `close`
    pub fn fail_close(self) -> Self {
        self.state.lock().fail_close = true;
        self
    }

    /// Current server-wide `local_infile` value
    pub fn local_infile_enabled(&self) -> bool {
        self.state.lock().local_infile
    }

    /// How often `local_infile` was looked up
    pub fn local_infile_queries(&self) -> usize {
        self.state.lock().local_infile_queries
    }

    /// Statements executed outside of transactions
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// All transactions begun so far
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().transactions.clone()
    }

    /// Committed rows of `table`
    pub fn committed_rows(&self, table: &str) -> Vec<StoredRow> {
        self.state
            .lock()
            .committed
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());

        if sql == ENABLE_LOCAL_INFILE {
            state.local_infile = true;
        } else if sql == DISABLE_LOCAL_INFILE {
            if state.fail_restore {
                return Err(Error::query_with_sql("access denied", sql));
            }
            state.local_infile = false;
        }
        Ok(0)
    }

    async fn query_scalar(&self, sql: &str) -> Result<Option<i64>> {
        let mut state = self.state.lock();
        if sql != LOCAL_INFILE_QUERY {
            return Ok(None);
        }

        state.local_infile_queries += 1;
        if let Some(message) = &state.fail_local_infile_query {
            return Err(Error::query_with_sql(message.clone(), sql));
        }
        Ok(Some(i64::from(state.local_infile)))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_begin {
            return Err(Error::transaction(message.clone()));
        }

        state.transactions.push(TransactionRecord {
            statements: Vec::new(),
            rows: Vec::new(),
            outcome: TransactionOutcome::Open,
        });

        Ok(Box::new(MockTransaction {
            state: Arc::clone(&self.state),
            index: state.transactions.len() - 1,
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        if state.fail_close {
            return Err(Error::connection("connection reset by peer"));
        }
        Ok(())
    }
}

/// Transaction handed out by [`MockConnection`]
#[derive(Debug)]
pub struct MockTransaction {
    state: Arc<Mutex<MockState>>,
    index: usize,
}

impl MockTransaction {
    fn record(&self, sql: String) {
        self.state.lock().transactions[self.index].statements.push(sql);
    }

    fn write_fails(&self) -> bool {
        self.state.lock().fail_write_on == Some(self.index + 1)
    }

    fn store(&self, table: &str, rows: Vec<StoredRow>) -> u64 {
        let mut state = self.state.lock();
        let count = rows.len() as u64;
        state.transactions[self.index]
            .rows
            .extend(rows.into_iter().map(|row| (table.to_string(), row)));
        count
    }

    fn finish(&self, outcome: TransactionOutcome) {
        let mut state = self.state.lock();
        let record = &mut state.transactions[self.index];
        record.outcome = outcome;

        if outcome == TransactionOutcome::Committed {
            let rows = record.rows.clone();
            for (table, row) in rows {
                state.committed.entry(table).or_default().push(row);
            }
        }
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.record(sql.to_string());
        Ok(0)
    }

    async fn execute_raw(&self, sql: Vec<u8>) -> Result<u64> {
        let statement = String::from_utf8_lossy(&sql).into_owned();
        self.record(statement.clone());

        if self.write_fails() {
            return Err(Error::query("Deadlock found when trying to get lock"));
        }

        let (table, rows) = parse_replace(&statement)
            .ok_or_else(|| Error::query_with_sql("You have an error in your SQL syntax", &statement))?;
        Ok(self.store(&table, rows))
    }

    async fn load_data(&self, sql: &str, source: InfileSource) -> Result<u64> {
        self.record(sql.to_string());

        if !self.state.lock().local_infile {
            return Err(Error::query_with_sql(
                "Loading local data is disabled; this must be enabled on both the client and server sides",
                sql,
            ));
        }
        if self.write_fails() {
            return Err(Error::query_with_sql("Lock wait timeout exceeded", sql));
        }

        let table = load_data_table(sql)
            .ok_or_else(|| Error::query_with_sql("You have an error in your SQL syntax", sql))?;

        let bytes = source
            .read_to_end()
            .await
            .map_err(|e| Error::io("failed to read LOAD DATA stream", e))?;
        let rows = parse_csv(&bytes)?;

        Ok(self.store(&table, rows))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let fails = self.state.lock().fail_commit_on == Some(self.index + 1);
        if fails {
            self.finish(TransactionOutcome::CommitFailed);
            return Err(Error::commit("Lost connection to MySQL server during query"));
        }
        self.finish(TransactionOutcome::Committed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::RolledBack);
        Ok(())
    }
}

/// Table named by `... INTO TABLE `t` ...`
fn load_data_table(sql: &str) -> Option<String> {
    let (_, rest) = sql.split_once("INTO TABLE ")?;
    let quoted = rest.split_whitespace().next()?;
    unquote_identifier(quoted)
}

/// Parse the CSV body of a `LOAD DATA` stream
fn parse_csv(bytes: &[u8]) -> Result<Vec<StoredRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| Error::type_conversion(format!("malformed CSV: {}", e)))?;
        rows.push(
            record
                .iter()
                .map(|field| match field {
                    f if f == NULL_LITERAL.as_bytes() => None,
                    f => Some(String::from_utf8_lossy(f).into_owned()),
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Split `replace into t values (a,b),(c,d)` into its table and tuples.
///
/// Fields are split on every comma, the way an unescaped statement reads.
fn parse_replace(statement: &str) -> Option<(String, Vec<StoredRow>)> {
    let rest = statement.strip_prefix("replace into ")?;
    let (table, values) = rest.split_once(" values ")?;
    let inner = values.strip_prefix('(')?.strip_suffix(')')?;

    let rows = inner
        .split("),(")
        .map(|tuple| {
            tuple
                .split(',')
                .map(|field| match field {
                    NULL_LITERAL => None,
                    f => Some(f.to_string()),
                })
                .collect()
        })
        .collect();

    Some((table.to_string(), rows))
}

// ============================================================================
// Mock Row Source
// ============================================================================

#[derive(Debug, Clone)]
struct MockTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// A mock upstream extractor
#[derive(Debug, Clone)]
pub struct MockRowSource {
    tables: Arc<Mutex<HashMap<String, MockTable>>>,
    fail_message: Arc<Mutex<Option<String>>>,
    channel_capacity: usize,
}

impl Default for MockRowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRowSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
            fail_message: Arc::new(Mutex::new(None)),
            channel_capacity: 16,
        }
    }

    /// Register a table
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        self.tables.lock().insert(
            name.to_string(),
            MockTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
        self
    }

    /// Set the row channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Make every column lookup fail
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.fail_message.lock() = Some(message.into());
        self
    }
}

#[async_trait]
impl crate::source::RowSource for MockRowSource {
    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        if let Some(message) = self.fail_message.lock().clone() {
            return Err(Error::query(message));
        }
        self.tables
            .lock()
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| Error::schema(format!("Table '{}' doesn't exist", table)))
    }

    async fn rows(&self, table: &str) -> Result<RowReceiver> {
        let rows = self
            .tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| Error::schema(format!("Table '{}' doesn't exist", table)))?;
        Ok(row_channel(rows, self.channel_capacity))
    }
}

/// Feed `rows` into a bounded channel from a background task.
///
/// The channel closes after the last row. Must be called inside a tokio
/// runtime.
pub fn row_channel(rows: Vec<Row>, capacity: usize) -> RowReceiver {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        for row in rows {
            if tx.send(row).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// `count` rows with an `id` column counting from 1 and a `name` column
pub fn numbered_rows(count: usize) -> Vec<Row> {
    (1..=count)
        .map(|i| Row::new().with("id", i.to_string()).with("name", format!("user-{}", i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_data_table() {
        let sql = "LOAD DATA CONCURRENT LOCAL INFILE 'Reader::users' INTO TABLE `users` FIELDS";
        assert_eq!(load_data_table(sql), Some("users".to_string()));
    }

    #[test]
    fn test_parse_csv_null_and_quotes() {
        let rows = parse_csv(b"1,NULL\n2,\"a,\"\"b\"\"\"\n").unwrap();
        assert_eq!(rows[0], vec![Some("1".to_string()), None]);
        assert_eq!(rows[1], vec![Some("2".to_string()), Some("a,\"b\"".to_string())]);
    }

    #[test]
    fn test_parse_replace() {
        let (table, rows) = parse_replace("replace into t values (1,'a'),(2,NULL)").unwrap();
        assert_eq!(table, "t");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Some("2".to_string()), None]);
    }
}
