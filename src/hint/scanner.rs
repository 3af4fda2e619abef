//! Hint Log Scanner
//!
//! Replays hint files into an index for recovery, and audits them against a
//! live index to measure how much of the file is dead.

use std::path::Path;

use crate::error::{KvError, Result};
use crate::index::{ItemMeta, LiveIndex};

use super::file::HintFile;
use super::record::{HintEntry, RecordIter};

/// Outcome of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Records fully decoded
    pub records: usize,
    /// Records applied as upserts (version > 0)
    pub upserts: usize,
    /// Records applied as removals (tombstones)
    pub removals: usize,
    /// Bytes missing from a truncated final record, if any
    pub short_bytes: Option<usize>,
}

/// Outcome of a staleness audit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Records no longer backed by the live index
    pub deleted: usize,
    /// Records fully decoded
    pub total: usize,
    /// Bytes missing from a truncated final record, if any
    pub short_bytes: Option<usize>,
}

impl AuditReport {
    /// Share of stale records, 0.0 for an empty file
    pub fn stale_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.deleted as f64 / self.total as f64
        }
    }
}

/// Walk every complete record of `bytes`, stopping at a truncated tail.
/// Returns the shortfall of that tail, if there was one.
fn for_each_record<'a>(
    bytes: &'a [u8],
    bucket: u8,
    source: &Path,
    mut f: impl FnMut(HintEntry<'a>),
) -> Option<usize> {
    for item in RecordIter::new(bytes, bucket) {
        match item {
            Ok(entry) => f(entry),
            Err(KvError::TruncatedRecord { needed }) => {
                tracing::warn!(
                    "Scan {}: unexpected end, need {} byte(s)",
                    source.display(),
                    needed
                );
                return Some(needed);
            }
            Err(e) => {
                tracing::warn!("Scan {}: {}", source.display(), e);
                return None;
            }
        }
    }
    None
}

/// Rebuild `index` from the records of `hint`.
///
/// Positive versions are upserted; tombstones remove the key. A truncated
/// final record stops the scan and everything before it is kept.
pub fn replay<I: LiveIndex + ?Sized>(hint: &HintFile, bucket: u8, index: &I) -> ScanSummary {
    replay_bytes(hint.bytes(), bucket, index, hint.path())
}

/// `replay` over a raw decoded buffer
pub fn replay_bytes<I: LiveIndex + ?Sized>(
    bytes: &[u8],
    bucket: u8,
    index: &I,
    source: &Path,
) -> ScanSummary {
    let mut summary = ScanSummary::default();

    let short_bytes = for_each_record(bytes, bucket, source, |entry| {
        summary.records += 1;
        if entry.is_tombstone() {
            index.remove(entry.key);
            summary.removals += 1;
        } else {
            index.upsert(
                entry.key,
                ItemMeta::new(entry.locator, entry.version, entry.value_hash),
            );
            summary.upserts += 1;
        }
    });
    summary.short_bytes = short_bytes;

    tracing::debug!(
        "Replayed {} for bucket {}: {} records ({} upserts, {} removals)",
        source.display(),
        bucket,
        summary.records,
        summary.upserts,
        summary.removals
    );
    summary
}

/// Count the records of `hint` that the populated `index` no longer backs.
///
/// A record is stale when the index has no entry for its key, the entry's
/// locator differs from the record's, or the entry is a tombstone.
pub fn audit_staleness<I: LiveIndex + ?Sized>(
    hint: &HintFile,
    bucket: u8,
    index: &I,
) -> AuditReport {
    audit_bytes(hint.bytes(), bucket, index, hint.path())
}

/// `audit_staleness` over a raw decoded buffer
pub fn audit_bytes<I: LiveIndex + ?Sized>(
    bytes: &[u8],
    bucket: u8,
    index: &I,
    source: &Path,
) -> AuditReport {
    let mut report = AuditReport::default();

    let short_bytes = for_each_record(bytes, bucket, source, |entry| {
        report.total += 1;
        let stale = match index.lookup(entry.key) {
            None => true,
            Some(meta) => meta.locator != entry.locator || meta.is_tombstone(),
        };
        if stale {
            report.deleted += 1;
        }
    });
    report.short_bytes = short_bytes;

    tracing::debug!(
        "Audited {} for bucket {}: {}/{} stale",
        source.display(),
        bucket,
        report.deleted,
        report.total
    );
    report
}

// =============================================================================
// Path-level helpers
// =============================================================================

/// Open `path` (rewriting it to `rewrite` if given) and replay it.
///
/// `Ok(None)` means there was no hint file to replay.
pub fn replay_path<I: LiveIndex + ?Sized>(
    path: &Path,
    rewrite: Option<&Path>,
    bucket: u8,
    index: &I,
) -> Result<Option<ScanSummary>> {
    let Some(hint) = HintFile::open_with_rewrite(path, rewrite)? else {
        return Ok(None);
    };
    let summary = replay(&hint, bucket, index);
    hint.close();
    Ok(Some(summary))
}

/// Open `path` and audit it against `index`.
///
/// A missing or empty file audits as zero records.
pub fn audit_path<I: LiveIndex + ?Sized>(
    path: &Path,
    bucket: u8,
    index: &I,
) -> Result<AuditReport> {
    let Some(hint) = HintFile::open(path)? else {
        return Ok(AuditReport::default());
    };
    let report = audit_staleness(&hint, bucket, index);
    hint.close();
    Ok(report)
}
