//! Hint Store
//!
//! Maps buckets to their hint files and coordinates recovery, snapshots and
//! audits.
//!
//! ## Responsibilities
//! - Name hint files per bucket and per encoding
//! - Discover which buckets have a snapshot on startup
//! - Migrate a snapshot to the configured encoding while recovering it
//! - Keep exactly one snapshot per bucket on disk

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::index::LiveIndex;

use super::builder::{BuildSummary, HintBuilder};
use super::scanner::{audit_path, replay_path, AuditReport, ScanSummary};
use super::COMPRESSED_EXTENSION;

/// Per-bucket hint files under one data directory
#[derive(Debug, Clone)]
pub struct HintStore {
    /// Directory holding `bucket_NNN.hint[.lz4]`
    data_dir: PathBuf,

    /// Number of buckets; ids run 0..bucket_count
    bucket_count: usize,

    /// Encoding new snapshots are written in
    compress: bool,

    builder: HintBuilder,
}

impl HintStore {
    const FILE_PREFIX: &'static str = "bucket_";
    const FILE_EXTENSION: &'static str = "hint";

    /// Open the store, creating the data directory if needed
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            bucket_count: config.bucket_count,
            compress: config.compress_hints,
            builder: HintBuilder::new(config.build_buffer_capacity),
        })
    }

    /// Rebuild `index` for `bucket` from its snapshot.
    ///
    /// Returns `Ok(None)` when the bucket has no snapshot; the caller then
    /// falls back to scanning the value file. A snapshot found only in the
    /// other encoding is converted while it is replayed.
    pub fn recover<I: LiveIndex + ?Sized>(
        &self,
        bucket: u8,
        index: &I,
    ) -> Result<Option<ScanSummary>> {
        self.check_bucket(bucket)?;
        let path = self.hint_path(bucket);
        let other = self.alternate_path(bucket);

        if let Some(summary) = replay_path(&path, None, bucket, index)? {
            return Ok(Some(summary));
        }

        if other.exists() {
            tracing::info!(
                "Migrating {} to {}",
                other.display(),
                path.display()
            );
            let summary = replay_path(&other, Some(&path), bucket, index)?;
            // Keep the old encoding unless the rewrite produced data
            if has_data(&path) {
                remove_if_exists(&other)?;
            }
            return Ok(summary);
        }

        tracing::debug!("Bucket {} has no hint file", bucket);
        Ok(None)
    }

    /// Write a fresh snapshot of `index` for `bucket`
    pub fn snapshot<I: LiveIndex + ?Sized>(&self, bucket: u8, index: &I) -> Result<BuildSummary> {
        self.check_bucket(bucket)?;
        let summary = self.builder.snapshot(index, &self.hint_path(bucket))?;
        // A leftover in the other encoding would shadow an empty snapshot
        remove_if_exists(&self.alternate_path(bucket))?;
        Ok(summary)
    }

    /// Audit `bucket`'s snapshot against the live `index`.
    ///
    /// `Ok(None)` when the bucket has no snapshot.
    pub fn audit<I: LiveIndex + ?Sized>(
        &self,
        bucket: u8,
        index: &I,
    ) -> Result<Option<AuditReport>> {
        self.check_bucket(bucket)?;
        let path = self.hint_path(bucket);
        if !path.exists() {
            return Ok(None);
        }
        audit_path(&path, bucket, index).map(Some)
    }

    /// Buckets that have a hint file in either encoding, ascending
    pub fn existing_buckets(&self) -> Result<Vec<u8>> {
        let mut buckets = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }
            if let Some(bucket) = Self::parse_bucket_id(&file_path) {
                if (bucket as usize) < self.bucket_count {
                    buckets.push(bucket);
                }
            }
        }
        buckets.sort_unstable();
        buckets.dedup();
        Ok(buckets)
    }

    /// Path of `bucket`'s hint file in the configured encoding
    pub fn hint_path(&self, bucket: u8) -> PathBuf {
        Self::path_with_dir(&self.data_dir, bucket, self.compress)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn alternate_path(&self, bucket: u8) -> PathBuf {
        Self::path_with_dir(&self.data_dir, bucket, !self.compress)
    }

    fn check_bucket(&self, bucket: u8) -> Result<()> {
        if (bucket as usize) >= self.bucket_count {
            return Err(KvError::Config(format!(
                "bucket {} out of range (bucket_count = {})",
                bucket, self.bucket_count
            )));
        }
        Ok(())
    }

    /// "bucket_007.hint" or "bucket_007.hint.lz4"
    fn path_with_dir(dir: &Path, bucket: u8, compressed: bool) -> PathBuf {
        let mut name = format!("{}{:03}.{}", Self::FILE_PREFIX, bucket, Self::FILE_EXTENSION);
        if compressed {
            name.push('.');
            name.push_str(COMPRESSED_EXTENSION);
        }
        dir.join(name)
    }

    /// "bucket_042.hint" / "bucket_042.hint.lz4" → Some(42)
    fn parse_bucket_id(path: &Path) -> Option<u8> {
        let name = path.file_name()?.to_str()?;
        let name = name
            .strip_suffix(COMPRESSED_EXTENSION)
            .and_then(|n| n.strip_suffix('.'))
            .unwrap_or(name);
        let id = name
            .strip_prefix(Self::FILE_PREFIX)?
            .strip_suffix(Self::FILE_EXTENSION)?
            .strip_suffix('.')?;
        id.parse().ok()
    }
}

fn has_data(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(KvError::Io(e)),
    }
}
