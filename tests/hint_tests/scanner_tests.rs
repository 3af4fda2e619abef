//! Tests for the hint log scanner
//!
//! These tests verify:
//! - Replay rebuilds an index from a snapshot
//! - Replaying the same file twice gives identical indexes
//! - Tombstones remove keys, newer records overwrite older ones
//! - A truncated tail keeps every complete record before it
//! - The staleness audit counts dead records

use std::fs;
use std::path::{Path, PathBuf};

use bucketkv::hint::{
    audit_path, audit_staleness, encode_into, record_len, replay, replay_bytes, replay_path,
    HintBuilder, HintFile, Locator,
};
use bucketkv::{ItemMeta, LiveIndex, MemIndex};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Write (key, offset_high, version) records to `path`
fn write_records(path: &Path, records: &[(&str, u32, i32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, offset, version) in records {
        encode_into(&mut out, key.as_bytes(), Locator::from_parts(*offset, 0), *version, 0xaa)
            .unwrap();
    }
    fs::write(path, &out).unwrap();
    out
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_replay_rebuilds_index() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_007.hint");
    write_records(&path, &[("a", 1, 1), ("b", 2, 1), ("c", 3, 2)]);

    let index = MemIndex::new();
    let hint = HintFile::open(&path).unwrap().unwrap();
    let summary = replay(&hint, 7, &index);

    assert_eq!(summary.records, 3);
    assert_eq!(summary.upserts, 3);
    assert_eq!(summary.removals, 0);
    assert_eq!(summary.short_bytes, None);
    assert_eq!(index.len(), 3);

    let c = index.lookup(b"c").unwrap();
    assert_eq!(c.locator, Locator::from_parts(3, 7));
    assert_eq!(c.locator.bucket(), 7);
    assert_eq!(c.version, 2);
    assert_eq!(c.value_hash, 0xaa);
}

#[test]
fn test_replay_is_idempotent() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    write_records(
        &path,
        &[("x", 1, 1), ("y", 2, 1), ("x", 3, 2), ("z", 4, 1), ("y", 5, 0)],
    );

    let first = MemIndex::new();
    let second = MemIndex::new();
    replay_path(&path, None, 0, &first).unwrap().unwrap();
    replay_path(&path, None, 0, &second).unwrap().unwrap();

    assert_eq!(first.entries(), second.entries());
}

#[test]
fn test_tombstone_removes_earlier_key() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    write_records(&path, &[("k", 10, 1), ("other", 11, 1), ("k", 12, 0)]);

    let index = MemIndex::new();
    let summary = replay_path(&path, None, 0, &index).unwrap().unwrap();

    assert_eq!(summary.removals, 1);
    assert!(index.lookup(b"k").is_none());
    assert!(index.lookup(b"other").is_some());
}

#[test]
fn test_negative_version_is_tombstone() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    write_records(&path, &[("k", 10, 3), ("k", 12, -3)]);

    let index = MemIndex::new();
    replay_path(&path, None, 0, &index).unwrap();

    assert!(index.is_empty());
}

#[test]
fn test_newer_record_overwrites() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    write_records(&path, &[("k", 10, 1), ("k", 20, 2)]);

    let index = MemIndex::new();
    replay_path(&path, None, 0, &index).unwrap();

    let meta = index.lookup(b"k").unwrap();
    assert_eq!(meta.locator.offset_high(), 20);
    assert_eq!(meta.version, 2);
}

#[test]
fn test_replay_missing_file_is_none() {
    let (_temp, dir) = setup_temp_dir();
    let index = MemIndex::new();
    assert!(replay_path(&dir.join("nope.hint"), None, 0, &index).unwrap().is_none());
}

#[test]
fn test_replay_with_rewrite_converts() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let target = dir.join("bucket_000.hint.lz4");
    let raw = write_records(&path, &[("a", 1, 1), ("b", 2, 1)]);

    let index = MemIndex::new();
    replay_path(&path, Some(&target), 0, &index).unwrap();

    let converted = HintFile::open(&target).unwrap().unwrap();
    assert_eq!(converted.bytes(), raw.as_slice());
    assert_eq!(index.len(), 2);
}

#[test]
fn test_replay_survives_failed_rewrite() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let target = dir.join("missing").join("bucket_000.hint.lz4");
    write_records(&path, &[("a", 1, 1), ("b", 2, 1)]);

    let index = MemIndex::new();
    let summary = replay_path(&path, Some(&target), 0, &index).unwrap().unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(index.len(), 2);
    assert!(path.exists());
    assert!(!target.exists());
}

// =============================================================================
// Partial-file recovery
// =============================================================================

#[test]
fn test_truncated_tail_keeps_complete_records() {
    let records = [("alpha", 1, 1), ("beta", 2, 1), ("gamma", 3, 1)];
    let (_temp, dir) = setup_temp_dir();
    let full = write_records(&dir.join("full.hint"), &records);
    let last_start = record_len(5) + record_len(4);

    for cut in (last_start + 1)..full.len() {
        let index = MemIndex::new();
        let summary = replay_bytes(&full[..cut], 0, &index, Path::new("cut.hint"));

        assert_eq!(summary.records, 2, "cut {}", cut);
        assert_eq!(summary.short_bytes, Some(full.len() - cut));
        assert!(index.lookup(b"alpha").is_some());
        assert!(index.lookup(b"beta").is_some());
        assert!(index.lookup(b"gamma").is_none());
    }
}

#[test]
fn test_truncated_file_on_disk() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let full = write_records(&path, &[("one", 1, 1), ("two", 2, 1)]);
    fs::write(&path, &full[..full.len() - 2]).unwrap();

    let index = MemIndex::new();
    let summary = replay_path(&path, None, 0, &index).unwrap().unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.short_bytes, Some(2));
    assert_eq!(index.len(), 1);
}

// =============================================================================
// Staleness audit
// =============================================================================

#[test]
fn test_audit_counts_stale_records() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    // A live, A tombstone (written at a later offset), B absent from index
    write_records(&path, &[("A", 1, 1), ("A", 9, 0), ("B", 2, 1)]);

    let index = MemIndex::new();
    index.upsert(b"A", ItemMeta::new(Locator::from_parts(1, 0), 1, 0xaa));

    let hint = HintFile::open(&path).unwrap().unwrap();
    let report = audit_staleness(&hint, 0, &index);

    assert_eq!(report.deleted, 2);
    assert_eq!(report.total, 3);
    assert!((report.stale_ratio() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_audit_moved_and_tombstoned_entries() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_003.hint");
    write_records(&path, &[("moved", 5, 1), ("dead", 6, 1), ("same", 7, 1)]);

    let index = MemIndex::new();
    index.upsert(b"moved", ItemMeta::new(Locator::from_parts(50, 3), 2, 0));
    index.upsert(b"dead", ItemMeta::new(Locator::from_parts(6, 3), -1, 0));
    index.upsert(b"same", ItemMeta::new(Locator::from_parts(7, 3), 1, 0));

    let report = audit_path(&path, 3, &index).unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.deleted, 2);
}

#[test]
fn test_audit_fresh_snapshot_has_no_stale_records() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_002.hint");
    let index = MemIndex::new();
    for i in 0..50u32 {
        let key = format!("key{}", i);
        index.upsert(key.as_bytes(), ItemMeta::new(Locator::from_parts(i, 2), 1, 0));
    }
    HintBuilder::default().snapshot(&index, &path).unwrap();

    let report = audit_path(&path, 2, &index).unwrap();

    assert_eq!(report.total, 50);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.stale_ratio(), 0.0);
}

#[test]
fn test_audit_missing_file_is_empty() {
    let (_temp, dir) = setup_temp_dir();
    let report = audit_path(&dir.join("none.hint"), 0, &MemIndex::new()).unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(report.stale_ratio(), 0.0);
}
