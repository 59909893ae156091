//! MySQL backend for rivven-bulk
//!
//! Provides the pooled [`MySqlConnection`] and the per-batch
//! [`MySqlTransaction`]. `LOAD DATA LOCAL INFILE` is served from the batch's
//! in-memory pipe through the connection's infile handler, so no file ever
//! touches the local filesystem.

use async_trait::async_trait;
use futures::StreamExt;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionConfig, InfileSource, Transaction};
use crate::error::{Error, Result};

/// URL parameters that request multi-statement support
const MULTI_STATEMENT_PARAMS: [&str; 2] = ["multi_statements", "multiStatements"];

/// Normalize a connection URL for the driver.
///
/// Multi-statement support is always on for this backend. Any
/// `multi_statements` / `multiStatements` parameter is removed, and a URL
/// that does not request it is logged as overridden.
pub fn force_multi_statements(raw: &str) -> Result<String> {
    let mut parsed =
        url::Url::parse(raw).map_err(|e| Error::config(format!("Invalid MySQL URL: {}", e)))?;

    let mut requested = false;
    let mut kept = Vec::new();
    for (key, value) in parsed.query_pairs() {
        if MULTI_STATEMENT_PARAMS.contains(&key.as_ref()) {
            requested = value.eq_ignore_ascii_case("true");
            continue;
        }
        kept.push((key.into_owned(), value.into_owned()));
    }

    if !requested {
        warn!("connection URL does not enable multi statements, forcing it on");
    }

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(parsed.to_string())
}

/// Pool options derived from the connection configuration
fn pool_opts(config: &ConnectionConfig) -> Result<PoolOpts> {
    let max = config.max_open_connections;
    if max == 0 {
        return Err(Error::config("max_open_connections must be greater than 0"));
    }
    let min = config.max_idle_connections.min(max);

    let constraints = PoolConstraints::new(min, max).ok_or_else(|| {
        Error::config(format!(
            "Invalid pool limits: max_open_connections={}, max_idle_connections={}",
            config.max_open_connections, config.max_idle_connections
        ))
    })?;

    Ok(PoolOpts::default()
        .with_constraints(constraints)
        .with_abs_conn_ttl(config.max_connection_lifetime()))
}

/// Pooled MySQL connection
pub struct MySqlConnection {
    pool: Pool,
}

impl MySqlConnection {
    /// Create the connection pool. No connection is opened until first use.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::config("MySQL URL is empty"));
        }

        let url = force_multi_statements(&config.url)?;
        let opts = mysql_async::Opts::from_url(&url)
            .map_err(|e| Error::config(format!("Invalid MySQL connection string: {}", e)))?;

        let opts = OptsBuilder::from_opts(opts).pool_opts(pool_opts(config)?);

        debug!(config = ?config, "MySQL pool created");

        Ok(Self {
            pool: Pool::new(opts),
        })
    }

    async fn get_conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| Error::connection_with_source("Failed to connect to MySQL", e))
    }
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        conn.query_drop(sql)
            .await
            .map_err(|e| Error::query_with_source("Failed to execute statement", sql, e))?;
        Ok(conn.affected_rows())
    }

    async fn query_scalar(&self, sql: &str) -> Result<Option<i64>> {
        let mut conn = self.get_conn().await?;
        let value: Option<Option<i64>> = conn
            .query_first(sql)
            .await
            .map_err(|e| Error::query_with_source("Failed to run query", sql, e))?;
        Ok(value.flatten())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let mut conn = self.get_conn().await?;
        conn.query_drop("BEGIN")
            .await
            .map_err(|e| Error::transaction_with_source("Failed to begin transaction", e))?;

        Ok(Box::new(MySqlTransaction {
            conn: Mutex::new(Some(conn)),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| Error::connection_with_source("Failed to close MySQL pool", e))
    }
}

/// MySQL transaction bound to one pooled connection.
///
/// Uses manual BEGIN/COMMIT/ROLLBACK. Session settings made inside the
/// transaction (e.g. `foreign_key_checks`) are reset when the connection goes
/// back to the pool.
pub struct MySqlTransaction {
    conn: Mutex<Option<Conn>>,
}

impl MySqlTransaction {
    async fn run<Q>(&self, sql: Q, shown: &str) -> Result<u64>
    where
        Q: AsQuery + 'static,
    {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::transaction("Transaction already completed"))?;

        conn.query_drop(sql)
            .await
            .map_err(|e| Error::query_with_source("Failed to execute in transaction", shown, e))?;

        Ok(conn.affected_rows())
    }

    async fn finish(&self, sql: &str) -> std::result::Result<(), mysql_async::Error> {
        let mut guard = self.conn.lock().await;
        match guard.take() {
            Some(mut conn) => conn.query_drop(sql).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.run(sql.to_string(), sql).await
    }

    async fn execute_raw(&self, sql: Vec<u8>) -> Result<u64> {
        let shown = String::from_utf8_lossy(&sql[..sql.len().min(128)]).into_owned();
        self.run(sql, &shown).await
    }

    async fn load_data(&self, sql: &str, source: InfileSource) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::transaction("Transaction already completed"))?;

        let name = source.name().to_string();
        let stream = source.into_stream();
        conn.set_infile_handler(async move { Ok(stream.boxed()) });

        conn.query_drop(sql).await.map_err(|e| {
            Error::query_with_source(format!("LOAD DATA from '{}' failed", name), sql, e)
        })?;

        Ok(conn.affected_rows())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")
            .await
            .map_err(|e| Error::commit_with_source("Failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
            .await
            .map_err(|e| Error::transaction_with_source("Failed to rollback transaction", e))
    }
}
