//! Keyed async locks
//!
//! Sessions use [`KeyedLocks::try_lock`] so an overlapping submission is
//! rejected instead of queued. Profile flushes use [`KeyedLocks::lock`] and
//! wait their turn.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop entries nobody holds or waits on
        locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire without waiting; `None` if the key is held
    pub fn try_lock(&self, key: &K) -> Option<OwnedMutexGuard<()>> {
        self.entry(key).try_lock_owned().ok()
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.entry(key).lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_lock_rejects_while_held() {
        let locks = KeyedLocks::new();
        let guard = locks.try_lock(&1u32).unwrap();
        assert!(locks.try_lock(&1u32).is_none());
        assert!(locks.try_lock(&2u32).is_some());

        drop(guard);
        assert!(locks.try_lock(&1u32).is_some());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = KeyedLocks::new();
        for key in 0..100u32 {
            let _guard = locks.lock(&key).await;
        }
        assert!(locks.len() <= 1);
    }
}
