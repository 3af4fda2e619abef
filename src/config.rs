//! Configuration for bucketkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KvError, Result};

/// Largest number of buckets: the bucket id is the low byte of a locator
pub const MAX_BUCKETS: usize = 256;

/// Main configuration for a bucketkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all hint files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── bucket_000.hint      (raw packed records)
    ///     └── bucket_001.hint.lz4  (LZ4-compressed packed records)
    pub data_dir: PathBuf,

    /// Number of buckets the keyspace is sharded into (1..=256)
    pub bucket_count: usize,

    // -------------------------------------------------------------------------
    // Hint Log Configuration
    // -------------------------------------------------------------------------
    /// Write new snapshots LZ4-compressed
    pub compress_hints: bool,

    /// Initial capacity of the snapshot build buffer (in bytes)
    pub build_buffer_capacity: usize,

    // -------------------------------------------------------------------------
    // Dispatch Configuration
    // -------------------------------------------------------------------------
    /// Number of worker threads running the dispatch loop (one runs inline)
    pub worker_threads: usize,

    /// Bounded wait of a single backend poll (milliseconds)
    pub poll_timeout_ms: u64,

    /// Fixed capacity of the descriptor table and the ready list
    pub max_descriptors: usize,

    /// Max idle connections kept for reuse
    pub conn_freelist_capacity: usize,

    /// Max idle item buffers kept for reuse
    pub item_freelist_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./bucketkv_data"),
            bucket_count: 16,
            compress_hints: false,
            build_buffer_capacity: 1024 * 1024, // 1 MB
            worker_threads: 4,
            poll_timeout_ms: 1000,
            max_descriptors: 64 * 1024,
            conn_freelist_capacity: 200,
            item_freelist_capacity: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Poll timeout as a Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Reject settings the hint store or the dispatch loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 || self.bucket_count > MAX_BUCKETS {
            return Err(KvError::Config(format!(
                "bucket_count must be in 1..={}, got {}",
                MAX_BUCKETS, self.bucket_count
            )));
        }
        if self.build_buffer_capacity == 0 {
            return Err(KvError::Config(
                "build_buffer_capacity must be non-zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(KvError::Config("worker_threads must be non-zero".to_string()));
        }
        if self.poll_timeout_ms == 0 {
            return Err(KvError::Config("poll_timeout_ms must be non-zero".to_string()));
        }
        if self.max_descriptors == 0 {
            return Err(KvError::Config("max_descriptors must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all hint files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of buckets
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.config.bucket_count = count;
        self
    }

    /// Write new hint snapshots compressed
    pub fn compress_hints(mut self, enabled: bool) -> Self {
        self.config.compress_hints = enabled;
        self
    }

    /// Set the initial build buffer capacity (in bytes)
    pub fn build_buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.build_buffer_capacity = bytes;
        self
    }

    /// Set the number of dispatch worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the bounded poll wait (in milliseconds)
    pub fn poll_timeout_ms(mut self, ms: u64) -> Self {
        self.config.poll_timeout_ms = ms;
        self
    }

    /// Set the descriptor table capacity
    pub fn max_descriptors(mut self, count: usize) -> Self {
        self.config.max_descriptors = count;
        self
    }

    /// Set the connection freelist cap
    pub fn conn_freelist_capacity(mut self, count: usize) -> Self {
        self.config.conn_freelist_capacity = count;
        self
    }

    /// Set the item buffer freelist cap
    pub fn item_freelist_capacity(mut self, count: usize) -> Self {
        self.config.item_freelist_capacity = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
