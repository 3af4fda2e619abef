//! Error types for bucketkv
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for bucketkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Mapped File Errors
    // -------------------------------------------------------------------------
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("mmap of {} failed: {source}", path.display())]
    MapFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Hint Record / Hint File Errors
    // -------------------------------------------------------------------------
    #[error("Truncated hint record: {needed} more bytes needed")]
    TruncatedRecord { needed: usize },

    #[error("Key too long for a hint record: {0} bytes (max 255)")]
    KeyTooLong(usize),

    #[error("Corrupt hint file {}: decompressed {actual} bytes, header says {expected}", path.display())]
    CorruptHintFile {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Short write to {}: wrote {written} of {expected} bytes", path.display())]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    // -------------------------------------------------------------------------
    // Dispatch Errors
    // -------------------------------------------------------------------------
    #[error("Descriptor {fd} exceeds table capacity {capacity}")]
    TooManyDescriptors { fd: usize, capacity: usize },

    #[error("Event backend rejected descriptor {fd}: {source}")]
    BackendRejected {
        fd: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Whether this error must end the process.
    ///
    /// Only a compressed hint file whose decoded size disagrees with its own
    /// header qualifies: there is no partial recovery from it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KvError::CorruptHintFile { .. })
    }
}
