//! Error types for rivven-bulk
//!
//! Every failure is classified so callers can tell setup problems apart from
//! statement failures and, importantly, from commit failures:
//! - Setup errors (column lookup, transaction begin) leave no partial state
//! - Statement errors roll back the current batch
//! - Commit errors may already have side effects on the server
//! - Teardown errors combine connection-close and `local_infile` restore failures

use std::fmt;
use thiserror::Error;

/// Result type for rivven-bulk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error source
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-related errors
    Connection,
    /// Configuration error
    Configuration,
    /// Column lookup / table layout errors
    Schema,
    /// Transaction begin/rollback errors
    Transaction,
    /// Statement execution errors
    Query,
    /// Commit failed; side effects may be visible
    Commit,
    /// Enabling `local_infile` on the server failed
    LocalInfile,
    /// Value could not be encoded
    TypeConversion,
    /// In-memory pipe I/O
    Io,
    /// Close / `local_infile` restore failures
    Teardown,
    /// Unknown/other errors
    Other,
}

/// Main error type for rivven-bulk
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Column lookup failed or the table layout is unusable
    #[error("schema error: {message}")]
    Schema {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Transaction could not be opened or rolled back
    #[error("transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Statement execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// Commit failed
    #[error("commit error: {message}")]
    Commit {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// `local_infile` could not be read or enabled
    #[error("local_infile error: {message}")]
    LocalInfile { message: String },

    /// Value could not be encoded as text
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Pipe I/O failed
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Close and/or `local_infile` restore failed
    #[error("{}", teardown_message(close.as_deref(), restore.as_deref()))]
    Teardown {
        close: Option<Box<Error>>,
        restore: Option<Box<Error>>,
    },

    /// A table load was aborted
    #[error("load of table `{table}` aborted at batch {batch}: {source}")]
    TableLoad {
        table: String,
        batch: u64,
        #[source]
        source: Box<Error>,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

fn teardown_message(close: Option<&Error>, restore: Option<&Error>) -> String {
    match (close, restore) {
        (Some(close), Some(restore)) => format!(
            "failed to close mysql connection ({close}) and `SET GLOBAL local_infile=0` ({restore})"
        ),
        (Some(close), None) => format!("failed to close mysql connection: {close}"),
        (None, Some(restore)) => format!(
            "failed `SET GLOBAL local_infile=0`, please do this manually: {restore}"
        ),
        (None, None) => "teardown failed".to_string(),
    }
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Schema { .. } => ErrorCategory::Schema,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Commit { .. } => ErrorCategory::Commit,
            Self::LocalInfile { .. } => ErrorCategory::LocalInfile,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Teardown { .. } => ErrorCategory::Teardown,
            Self::TableLoad { source, .. } => source.category(),
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this failure happened at commit time, after the server may
    /// already have applied some of the batch
    #[inline]
    pub fn is_commit_failure(&self) -> bool {
        self.category() == ErrorCategory::Commit
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            source: None,
        }
    }

    /// Create a schema error wrapping the row source failure
    pub fn schema_with_source(message: impl Into<String>, source: Error) -> Self {
        Self::Schema {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transaction error with source
    pub fn transaction_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transaction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a query error with the failing SQL and the driver error
    pub fn query_with_source(
        message: impl Into<String>,
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Create a commit error
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
            source: None,
        }
    }

    /// Create a commit error with source
    pub fn commit_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Commit {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `local_infile` toggle error
    pub fn local_infile(message: impl Into<String>) -> Self {
        Self::LocalInfile {
            message: message.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Combine close and restore outcomes. Returns `None` when both succeeded.
    pub fn teardown(close: Option<Error>, restore: Option<Error>) -> Option<Self> {
        if close.is_none() && restore.is_none() {
            return None;
        }
        Some(Self::Teardown {
            close: close.map(Box::new),
            restore: restore.map(Box::new),
        })
    }

    /// Scope this error to a table load
    pub fn for_table(self, table: impl Into<String>, batch: u64) -> Self {
        Self::TableLoad {
            table: table.into(),
            batch,
            source: Box::new(self),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Configuration => write!(f, "configuration"),
            Self::Schema => write!(f, "schema"),
            Self::Transaction => write!(f, "transaction"),
            Self::Query => write!(f, "query"),
            Self::Commit => write!(f, "commit"),
            Self::LocalInfile => write!(f, "local_infile"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Io => write!(f, "io"),
            Self::Teardown => write!(f, "teardown"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_is_distinct_from_query() {
        assert!(Error::commit("lost connection").is_commit_failure());
        assert!(!Error::query("syntax error").is_commit_failure());
        assert_ne!(
            Error::commit("x").category(),
            Error::query("x").category()
        );
    }

    #[test]
    fn test_table_load_delegates_category() {
        let err = Error::query_with_sql("duplicate key", "LOAD DATA ...").for_table("users", 2);
        assert_eq!(err.category(), ErrorCategory::Query);
        let msg = err.to_string();
        assert!(msg.contains("users"));
        assert!(msg.contains("batch 2"));
        assert!(msg.contains("duplicate key"));
    }

    #[test]
    fn test_teardown_none_when_both_succeed() {
        assert!(Error::teardown(None, None).is_none());
    }

    #[test]
    fn test_teardown_messages() {
        let close_only = Error::teardown(Some(Error::connection("broken pipe")), None).unwrap();
        assert_eq!(close_only.category(), ErrorCategory::Teardown);
        assert!(close_only
            .to_string()
            .starts_with("failed to close mysql connection"));

        let restore_only = Error::teardown(None, Some(Error::query("denied"))).unwrap();
        assert!(restore_only.to_string().contains("please do this manually"));

        let both = Error::teardown(
            Some(Error::connection("broken pipe")),
            Some(Error::query("denied")),
        )
        .unwrap();
        let msg = both.to_string();
        assert!(msg.contains("broken pipe"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::LocalInfile.to_string(), "local_infile");
        assert_eq!(ErrorCategory::Commit.to_string(), "commit");
    }
}
