//! Per-key async locks
//!
//! Serialises operations on the same key (a product, a user's address set, an
//! order) while leaving different keys fully independent.

use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Number of tracked keys above which idle entries are evicted on the next lock.
const EVICTION_THRESHOLD: usize = 1_024;

#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Access is released when the guard drops.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        if self.locks.len() > EVICTION_THRESHOLD {
            self.evict_idle();
        }

        let mutex = Arc::clone(self.locks.entry(key).or_default().value());

        mutex.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn evict_idle(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
