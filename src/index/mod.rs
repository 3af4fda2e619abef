//! Live Index Module
//!
//! The boundary between the hint log and a bucket's in-memory hash index.
//!
//! ## Responsibilities
//! - Expose every live entry for snapshotting
//! - Accept upserts and removals during hint replay
//! - Answer point lookups during staleness audits
//!
//! ## Data Structure Choice
//! `MemIndex` uses a BTreeMap wrapped in RwLock:
//! - Sorted iteration, so snapshots of equal content are byte-identical
//! - Many concurrent readers, exclusive writer
//! - Any other hash index can plug in through `LiveIndex`

mod mem;

pub use mem::MemIndex;

use crate::hint::Locator;

/// Per-key metadata held by the index.
///
/// A `Copy` value: lookups hand back a plain value, never an allocation the
/// caller has to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMeta {
    /// Where the item lives in its bucket's value file
    pub locator: Locator,
    /// Write version; `<= 0` marks a tombstone
    pub version: i32,
    /// Short hash of the stored value
    pub value_hash: u16,
}

impl ItemMeta {
    pub fn new(locator: Locator, version: i32, value_hash: u16) -> Self {
        Self {
            locator,
            version,
            value_hash,
        }
    }

    /// Tombstones carry a non-positive version
    pub fn is_tombstone(&self) -> bool {
        self.version <= 0
    }
}

/// Operations the hint log needs from an in-memory index.
///
/// Methods take `&self`; implementations synchronise internally.
pub trait LiveIndex {
    /// Call `visitor` once per entry, in a stable implementation-defined order
    fn visit(&self, visitor: &mut dyn FnMut(&[u8], ItemMeta));

    /// Insert or overwrite the entry for `key`
    fn upsert(&self, key: &[u8], meta: ItemMeta);

    /// Remove `key`, if present
    fn remove(&self, key: &[u8]);

    /// Point lookup
    fn lookup(&self, key: &[u8]) -> Option<ItemMeta>;

    /// Number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: LiveIndex + ?Sized> LiveIndex for &T {
    fn visit(&self, visitor: &mut dyn FnMut(&[u8], ItemMeta)) {
        (**self).visit(visitor)
    }

    fn upsert(&self, key: &[u8], meta: ItemMeta) {
        (**self).upsert(key, meta)
    }

    fn remove(&self, key: &[u8]) {
        (**self).remove(key)
    }

    fn lookup(&self, key: &[u8]) -> Option<ItemMeta> {
        (**self).lookup(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
