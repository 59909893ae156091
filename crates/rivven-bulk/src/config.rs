//! Loader configuration

use serde::Deserialize;

use crate::error::{Error, Result};

/// How rows are written into the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Stream CSV records through `LOAD DATA LOCAL INFILE`
    #[default]
    LoadData,
    /// Build one multi-row `replace into` statement per batch
    Replace,
}

impl WriteStrategy {
    /// Whether the strategy needs the server's `local_infile` permission
    pub const fn requires_local_infile(self) -> bool {
        matches!(self, Self::LoadData)
    }
}

impl std::fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadData => write!(f, "load_data"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Bulk loader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Maximum rows per transaction (default: 1000)
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Insertion strategy
    #[serde(default)]
    pub strategy: WriteStrategy,

    /// Capacity of the in-memory pipe between row encoder and `LOAD DATA`
    /// (default: 64 KiB)
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    /// Initial capacity reserved for a `replace into` statement
    /// (default: 1 MiB + 1 KiB). Only a hint; statements may grow past it.
    #[serde(default = "default_replace_buffer_capacity")]
    pub replace_buffer_capacity: usize,
}

fn default_batch_size() -> u64 {
    1000
}

fn default_pipe_capacity() -> usize {
    64 * 1024
}

fn default_replace_buffer_capacity() -> usize {
    1024 * 1024 + 1024
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            strategy: WriteStrategy::default(),
            pipe_capacity: default_pipe_capacity(),
            replace_buffer_capacity: default_replace_buffer_capacity(),
        }
    }
}

impl LoaderConfig {
    /// Set batch size
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set write strategy
    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set pipe capacity
    pub fn with_pipe_capacity(mut self, bytes: usize) -> Self {
        self.pipe_capacity = bytes;
        self
    }

    /// Set replace buffer capacity hint
    pub fn with_replace_buffer_capacity(mut self, bytes: usize) -> Self {
        self.replace_buffer_capacity = bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.pipe_capacity == 0 {
            return Err(Error::config("pipe_capacity must be at least 1 byte"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.strategy, WriteStrategy::LoadData);
        assert_eq!(config.replace_buffer_capacity, 1_049_600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = LoaderConfig::default().with_batch_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_strategy_requirements() {
        assert!(WriteStrategy::LoadData.requires_local_infile());
        assert!(!WriteStrategy::Replace.requires_local_infile());
        assert_eq!(WriteStrategy::Replace.to_string(), "replace");
    }
}
