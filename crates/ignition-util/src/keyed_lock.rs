//! Per-key mutual exclusion

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Serializes work per key while letting different keys proceed in parallel.
///
/// Entries are created on demand and dropped again once nobody holds or
/// waits for them, so the map only ever contains keys that are in use.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// The guarded value is `()`, so a panic in an earlier holder leaves
    /// nothing inconsistent behind; poisoning is ignored.
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.clone()).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map, one is ours.
        if Arc::strong_count(&lock) == 2 {
            map.remove(key);
        }

        result
    }

    /// Number of keys currently tracked
    pub fn active_keys(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);
        let barrier = Barrier::new(4);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    barrier.wait();
                    locks.with_lock(&"alice", || {
                        let n = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(n, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn entries_are_released_after_use() {
        let locks = KeyedLocks::new();
        let value = locks.with_lock(&1, || 7);
        assert_eq!(value, 7);
        assert_eq!(locks.active_keys(), 0);
    }

    #[test]
    fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let nested = locks.with_lock(&1, || locks.with_lock(&2, || "ok"));
        assert_eq!(nested, "ok");
    }
}
