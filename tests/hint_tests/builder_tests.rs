//! Tests for the hint log builder
//!
//! These tests verify:
//! - Snapshots contain one record per index entry
//! - Compressed and raw snapshots decode to identical records
//! - Snapshots of equal content are byte-identical
//! - An empty index leaves no hint file behind
//! - A failed build keeps the previous snapshot

use std::fs;
use std::path::PathBuf;

use bucketkv::hint::{tmp_path, HintBuilder, HintFile, Locator};
use bucketkv::{ItemMeta, KvError, LiveIndex, MemIndex};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Index with keys key00000..key{count}
fn index_with_entries(count: usize, bucket: u8) -> MemIndex {
    let index = MemIndex::new();
    for i in 0..count {
        let key = format!("key{:05}", i);
        let meta = ItemMeta::new(Locator::from_parts(i as u32 * 3, bucket), i as i32 + 1, i as u16);
        index.upsert(key.as_bytes(), meta);
    }
    index
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn test_build_writes_all_entries() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_004.hint");
    let index = index_with_entries(100, 4);

    let summary = HintBuilder::default().build(index, &path).unwrap();

    assert_eq!(summary.records, 100);
    assert!(!summary.compressed);
    assert_eq!(summary.raw_bytes, summary.written_bytes);
    assert_eq!(fs::metadata(&path).unwrap().len() as usize, summary.written_bytes);

    let hint = HintFile::open(&path).unwrap().unwrap();
    let keys: Vec<Vec<u8>> = hint.records(4).map(|r| r.unwrap().key.to_vec()).collect();
    assert_eq!(keys.len(), 100);
    assert_eq!(keys[0], b"key00000");
    assert_eq!(keys[99], b"key00099");
}

#[test]
fn test_build_preserves_metadata() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_009.hint");
    let index = MemIndex::new();
    index.upsert(b"alive", ItemMeta::new(Locator::from_parts(0xabcdef, 9), 12, 0xbeef));
    index.upsert(b"gone", ItemMeta::new(Locator::from_parts(0x10, 9), -4, 0));

    HintBuilder::default().snapshot(&index, &path).unwrap();

    let hint = HintFile::open(&path).unwrap().unwrap();
    let entries: Vec<_> = hint.records(9).map(|r| r.unwrap()).collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, b"alive");
    assert_eq!(entries[0].locator, Locator::from_parts(0xabcdef, 9));
    assert_eq!(entries[0].version, 12);
    assert_eq!(entries[0].value_hash, 0xbeef);
    assert_eq!(entries[1].key, b"gone");
    assert_eq!(entries[1].version, -4);
}

#[test]
fn test_compressed_and_raw_decode_identically() {
    let (_temp, dir) = setup_temp_dir();
    let raw_path = dir.join("bucket_000.hint");
    let lz4_path = dir.join("bucket_000.hint.lz4");
    let index = index_with_entries(500, 0);
    let builder = HintBuilder::default();

    let raw = builder.snapshot(&index, &raw_path).unwrap();
    let lz4 = builder.snapshot(&index, &lz4_path).unwrap();

    assert!(lz4.compressed);
    assert_eq!(raw.raw_bytes, lz4.raw_bytes);
    assert!(lz4.written_bytes < raw.written_bytes);

    let raw_hint = HintFile::open(&raw_path).unwrap().unwrap();
    let lz4_hint = HintFile::open(&lz4_path).unwrap().unwrap();
    assert_eq!(raw_hint.bytes(), lz4_hint.bytes());
}

#[test]
fn test_snapshots_are_reproducible() {
    let (_temp, dir) = setup_temp_dir();
    let first = dir.join("a.hint");
    let second = dir.join("b.hint");
    let builder = HintBuilder::default();

    builder.build(index_with_entries(64, 1), &first).unwrap();
    builder.build(index_with_entries(64, 1), &second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_small_initial_buffer_grows() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let index = index_with_entries(1000, 0);

    let (buf, records) = HintBuilder::new(16).encode(&index).unwrap();

    assert_eq!(records, 1000);
    assert!(buf.capacity() >= buf.len());
    assert!(buf.capacity().is_power_of_two());

    let summary = HintBuilder::new(16).snapshot(&index, &path).unwrap();
    assert_eq!(summary.raw_bytes, buf.len());
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_empty_index_leaves_no_file() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    fs::write(&path, b"stale snapshot").unwrap();

    let summary = HintBuilder::default().build(MemIndex::new(), &path).unwrap();

    assert_eq!(summary.records, 0);
    assert_eq!(summary.written_bytes, 0);
    assert!(!path.exists());
    assert!(HintFile::open(&path).unwrap().is_none());
}

#[test]
fn test_failed_build_keeps_previous_snapshot() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let builder = HintBuilder::default();
    builder.build(index_with_entries(5, 0), &path).unwrap();
    let before = fs::read(&path).unwrap();

    let index = index_with_entries(5, 0);
    let long_key = vec![b'z'; 300];
    index.upsert(&long_key, ItemMeta::new(Locator::new(0), 1, 0));

    match builder.snapshot(&index, &path) {
        Err(KvError::KeyTooLong(300)) => {}
        other => panic!("expected KeyTooLong, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!tmp_path(&path).exists());
}

#[test]
fn test_build_replaces_previous_snapshot() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("bucket_000.hint");
    let builder = HintBuilder::default();

    builder.build(index_with_entries(10, 0), &path).unwrap();
    builder.build(index_with_entries(3, 0), &path).unwrap();

    let hint = HintFile::open(&path).unwrap().unwrap();
    assert_eq!(hint.records(0).count(), 3);
}
