//! Hint Log Module
//!
//! Compact, memory-mapped snapshots of a bucket's index, so the index can be
//! rebuilt on restart without rescanning the value file.
//!
//! ## Responsibilities
//! - Encode index entries as packed records
//! - Snapshot an index atomically (write temp, verify, rename)
//! - Replay a snapshot into an empty index, tolerating a truncated tail
//! - Audit a snapshot against a live index (compaction signal)
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Record 1                                               │
//! │ ┌────────┬──────────┬──────────┬─────────┬───────────┐ │
//! │ │KSize(1)│PosHi (3) │ Ver (4)  │Hash (2) │Key + 0x00 │ │
//! │ └────────┴──────────┴──────────┴─────────┴───────────┘ │
//! ├────────────────────────────────────────────────────────┤
//! │ Record 2 ... (back to back, no padding, no count)     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! A `.lz4` suffix means the whole file is one LZ4 block with the
//! uncompressed length prepended (u32 LE).

mod builder;
mod file;
mod mfile;
mod record;
mod scanner;
mod store;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use builder::{BuildBuffer, BuildSummary, HintBuilder, DEFAULT_BUILD_CAPACITY};
pub use file::{compress, write_atomic, HintFile};
pub use mfile::MappedFile;
pub use record::{
    decode, encode, encode_into, record_len, HintEntry, Locator, RecordIter, MAX_KEY_SIZE,
    RECORD_HEADER_SIZE,
};
pub use scanner::{
    audit_bytes, audit_path, audit_staleness, replay, replay_bytes, replay_path, AuditReport,
    ScanSummary,
};
pub use store::HintStore;

/// File extension marking whole-file LZ4 compression
pub const COMPRESSED_EXTENSION: &str = "lz4";

/// Suffix of the sibling file a snapshot is staged in
pub const TMP_SUFFIX: &str = ".tmp";

/// Whether `path` names a compressed hint file
pub fn is_compressed_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == COMPRESSED_EXTENSION)
        .unwrap_or(false)
}

/// `<path>.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}
