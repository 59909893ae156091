//! Load statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Outcome of a single table load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLoadSummary {
    /// Table name
    pub table: String,
    /// Rows written across all committed batches
    pub rows_written: u64,
    /// Row count of every committed transaction, in commit order
    pub batches: Vec<u64>,
    /// Wall time of the load
    pub duration: Duration,
}

impl TableLoadSummary {
    /// Create an empty summary for a table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Record a committed batch
    pub fn record_batch(&mut self, rows: u64) {
        self.rows_written += rows;
        self.batches.push(rows);
    }

    /// Number of committed transactions, including a trailing empty one
    pub fn transactions(&self) -> usize {
        self.batches.len()
    }
}

/// Loader statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    /// Total rows written
    pub rows_written: u64,
    /// Total committed batches
    pub batches_committed: u64,
    /// Total batches rolled back or failed to commit
    pub batches_failed: u64,
    /// Tables fully loaded
    pub tables_loaded: u64,
    /// Total write duration (milliseconds)
    pub total_write_time_ms: u64,
    /// Average rows per second
    pub rows_per_second: f64,
}

/// Atomic loader statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicLoadStats {
    pub rows_written: AtomicU64,
    pub batches_committed: AtomicU64,
    pub batches_failed: AtomicU64,
    pub tables_loaded: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicLoadStats {
    /// Record a committed batch
    pub fn record_batch(&self, rows: u64, duration: Duration) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed batch
    pub fn record_batch_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed table
    pub fn record_table(&self) {
        self.tables_loaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> LoadStats {
        let rows = self.rows_written.load(Ordering::Relaxed);
        let time_ms = self.total_write_time_ms.load(Ordering::Relaxed);
        let rps = if time_ms > 0 {
            (rows as f64 * 1000.0) / time_ms as f64
        } else {
            0.0
        };

        LoadStats {
            rows_written: rows,
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            tables_loaded: self.tables_loaded.load(Ordering::Relaxed),
            total_write_time_ms: time_ms,
            rows_per_second: rps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_load_stats() {
        let stats = AtomicLoadStats::default();

        stats.record_batch(100, Duration::from_millis(200));
        stats.record_batch(50, Duration::from_millis(100));
        stats.record_batch_failure();
        stats.record_table();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rows_written, 150);
        assert_eq!(snapshot.batches_committed, 2);
        assert_eq!(snapshot.batches_failed, 1);
        assert_eq!(snapshot.tables_loaded, 1);
        assert_eq!(snapshot.total_write_time_ms, 300);
        assert!(snapshot.rows_per_second > 0.0);
    }

    #[test]
    fn test_table_summary() {
        let mut summary = TableLoadSummary::new("users");
        summary.record_batch(1000);
        summary.record_batch(0);

        assert_eq!(summary.rows_written, 1000);
        assert_eq!(summary.transactions(), 2);
    }
}
