//! Object freelists
//!
//! Mutex-guarded reuse pools. The lock covers only the push or pop itself.

use parking_lot::Mutex;

/// Bounded pool of reusable objects
#[derive(Debug)]
pub struct Freelist<T> {
    items: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> Freelist<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Take a pooled object; `None` means the caller allocates a fresh one
    pub fn acquire(&self) -> Option<T> {
        self.items.lock().pop()
    }

    /// Return an object to the pool.
    ///
    /// `Err` hands the object back when the pool is at capacity.
    pub fn try_release(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push(item);
        Ok(())
    }

    /// Return an object to the pool, dropping it if the pool is full.
    /// Returns whether it was kept.
    pub fn release(&self, item: T) -> bool {
        self.try_release(item).is_ok()
    }

    /// Objects currently pooled
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
