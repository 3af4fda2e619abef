//! Hint Log Builder
//!
//! Snapshots a live index into a new hint file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{KvError, Result};
use crate::index::{ItemMeta, LiveIndex};

use super::file::{compress, write_atomic};
use super::is_compressed_path;
use super::record::{encode_into, record_len};

/// Default initial capacity of the build buffer (1 MB)
pub const DEFAULT_BUILD_CAPACITY: usize = 1024 * 1024;

/// Outcome of one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Records encoded
    pub records: usize,
    /// Packed bytes before compression
    pub raw_bytes: usize,
    /// Bytes that landed on disk
    pub written_bytes: usize,
    /// Whether the output was compressed
    pub compressed: bool,
}

// =============================================================================
// Build Buffer
// =============================================================================

/// Growable byte buffer for encoded records.
///
/// Logical capacity doubles whenever the next record would not fit and never
/// shrinks while a build is running.
#[derive(Debug)]
pub struct BuildBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl BuildBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Make room for `additional` bytes, doubling as often as needed
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.buf.len() + additional;
        if needed <= self.capacity {
            return;
        }
        let mut capacity = self.capacity;
        while capacity < needed {
            capacity *= 2;
        }
        self.buf.reserve_exact(capacity - self.buf.len());
        self.capacity = capacity;
    }

    /// Logical capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Serializes live indexes into hint files
#[derive(Debug, Clone)]
pub struct HintBuilder {
    initial_capacity: usize,
}

impl Default for HintBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_CAPACITY)
    }
}

impl HintBuilder {
    pub fn new(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    /// Snapshot `index` to `path`, consuming the index.
    ///
    /// The index is dropped as soon as every entry is encoded, before
    /// compression and I/O start.
    pub fn build<I: LiveIndex>(&self, index: I, path: &Path) -> Result<BuildSummary> {
        let (buf, records) = self.encode(&index)?;
        drop(index);
        self.finish(buf, records, path)
    }

    /// Snapshot `index` to `path`, leaving the index in place
    pub fn snapshot<I: LiveIndex + ?Sized>(&self, index: &I, path: &Path) -> Result<BuildSummary> {
        let (buf, records) = self.encode(index)?;
        self.finish(buf, records, path)
    }

    /// Encode every entry of `index` in its visiting order
    pub fn encode<I: LiveIndex + ?Sized>(&self, index: &I) -> Result<(BuildBuffer, usize)> {
        let mut buf = BuildBuffer::with_capacity(self.initial_capacity);
        let mut records = 0;
        let mut failure = None;

        index.visit(&mut |key: &[u8], meta: ItemMeta| {
            if failure.is_some() {
                return;
            }
            buf.reserve(record_len(key.len()));
            match encode_into(buf.inner_mut(), key, meta.locator, meta.version, meta.value_hash) {
                Ok(_) => records += 1,
                Err(e) => failure = Some(e),
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok((buf, records)),
        }
    }

    fn finish(&self, buf: BuildBuffer, records: usize, path: &Path) -> Result<BuildSummary> {
        let raw_bytes = buf.len();
        let compressed = is_compressed_path(path);

        if buf.is_empty() {
            // An empty index leaves no file: readers see "no prior state"
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed stale hint file {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(KvError::Io(e)),
            }
            return Ok(BuildSummary {
                records: 0,
                raw_bytes: 0,
                written_bytes: 0,
                compressed,
            });
        }

        let out = if compressed {
            compress(buf.as_bytes())
        } else {
            buf.into_inner()
        };
        let written_bytes = write_atomic(path, &out)?;

        tracing::info!(
            "Built hint file {}: {} records, {} bytes ({} on disk)",
            path.display(),
            records,
            raw_bytes,
            written_bytes
        );

        Ok(BuildSummary {
            records,
            raw_bytes,
            written_bytes,
            compressed,
        })
    }
}
