use crate::core::SharedTransaction;
use std::sync::{Mutex, MutexGuard};

/// Pending transactions in arrival order. Entries are compared only by their
/// serialized form, and duplicates are kept.
pub struct MemoryPool {
    inner: Mutex<Vec<SharedTransaction>>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: Mutex::new(Vec::new()),
        }
    }

    // A panic while holding the lock cannot leave the Vec half-modified,
    // so a poisoned pool is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<SharedTransaction>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::error!("Memory pool lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn add(&self, tx: SharedTransaction) {
        self.lock().push(tx);
    }

    /// Remove the first entry serializing identically to `tx`; returns whether
    /// anything was removed
    pub fn remove(&self, tx: &SharedTransaction) -> bool {
        self.remove_serialized(&tx.serialize())
    }

    pub fn remove_serialized(&self, serialized: &str) -> bool {
        let mut pool = self.lock();
        match pool.iter().position(|t| t.serialize() == serialized) {
            Some(idx) => {
                pool.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, serialized: &str) -> bool {
        self.lock().iter().any(|t| t.serialize() == serialized)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the current pool; reading it does not drain anything
    pub fn snapshot(&self) -> Vec<SharedTransaction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
