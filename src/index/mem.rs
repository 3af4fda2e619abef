//! MemIndex implementation
//!
//! BTreeMap-based index with RwLock for concurrency.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{ItemMeta, LiveIndex};

/// In-memory index for one bucket
#[derive(Debug, Default)]
pub struct MemIndex {
    entries: RwLock<BTreeMap<Vec<u8>, ItemMeta>>,
}

impl MemIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries in key order (for tests, debugging)
    pub fn entries(&self) -> Vec<(Vec<u8>, ItemMeta)> {
        self.entries
            .read()
            .iter()
            .map(|(k, m)| (k.clone(), *m))
            .collect()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl LiveIndex for MemIndex {
    fn visit(&self, visitor: &mut dyn FnMut(&[u8], ItemMeta)) {
        let entries = self.entries.read();
        for (key, meta) in entries.iter() {
            visitor(key, *meta);
        }
    }

    fn upsert(&self, key: &[u8], meta: ItemMeta) {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(existing) => *existing = meta,
            None => {
                entries.insert(key.to_vec(), meta);
            }
        }
    }

    fn remove(&self, key: &[u8]) {
        self.entries.write().remove(key);
    }

    fn lookup(&self, key: &[u8]) -> Option<ItemMeta> {
        self.entries.read().get(key).copied()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
