//! One-time `local_infile` toggle
//!
//! `LOAD DATA LOCAL INFILE` requires the server-wide `local_infile` setting.
//! The guard checks it once per loader, enables it if needed and remembers
//! whether teardown has to switch it off again.
//!
//! # Limitation
//!
//! The setting is global to the server. Two loaders running against the same
//! server race on it: one may disable it while the other is still loading.
//! The guard does not coordinate across loaders.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::dialect::{DISABLE_LOCAL_INFILE, ENABLE_LOCAL_INFILE, LOCAL_INFILE_QUERY};
use crate::error::{Error, Result};

/// Tracks this loader's `local_infile` changes
#[derive(Debug, Default)]
pub struct LocalInfileGuard {
    // Ok(()) or the first failure's message; evaluation never repeats
    checked: OnceCell<std::result::Result<(), String>>,
    restore_on_close: AtomicBool,
}

impl LocalInfileGuard {
    /// Create a guard that has not evaluated the setting yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `local_infile` is enabled on the server.
    ///
    /// The check runs at most once; later calls replay its outcome.
    pub async fn ensure_enabled(&self, conn: &dyn Connection) -> Result<()> {
        let outcome = self
            .checked
            .get_or_init(|| async { self.enable(conn).await.map_err(|e| e.to_string()) })
            .await;

        outcome.clone().map_err(Error::local_infile)
    }

    async fn enable(&self, conn: &dyn Connection) -> Result<()> {
        let enabled = conn
            .query_scalar(LOCAL_INFILE_QUERY)
            .await?
            .is_some_and(|v| v != 0);

        if enabled {
            debug!("local_infile already enabled");
            return Ok(());
        }

        conn.execute(ENABLE_LOCAL_INFILE).await?;
        self.restore_on_close.store(true, Ordering::SeqCst);

        warn!("enabled server-wide local_infile, it will be disabled again on close");
        Ok(())
    }

    /// Whether the setting has been evaluated
    pub fn is_checked(&self) -> bool {
        self.checked.initialized()
    }

    /// Whether this guard switched the setting on
    pub fn needs_restore(&self) -> bool {
        self.restore_on_close.load(Ordering::SeqCst)
    }

    /// Undo the change made by [`ensure_enabled`](Self::ensure_enabled), if any
    pub async fn restore(&self, conn: &dyn Connection) -> Result<()> {
        if !self.restore_on_close.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        conn.execute(DISABLE_LOCAL_INFILE).await?;
        debug!("local_infile disabled");
        Ok(())
    }
}
