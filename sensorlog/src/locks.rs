//! Striped locks keyed by string.
//!
//! [`KeyedLocks`] maps any key onto one of a fixed number of mutexes by
//! hashing it. Two callers holding the same key always contend on the same
//! mutex; callers with different keys only contend when their keys land on
//! the same stripe.

use std::hash::{DefaultHasher, Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

/// Default number of lock stripes.
pub const DEFAULT_STRIPES: usize = 64;

/// A fixed table of mutexes selected by key hash.
#[derive(Debug)]
pub struct KeyedLocks {
    stripes: Vec<Mutex<()>>,
}

impl KeyedLocks {
    /// Creates a lock table with `stripes` mutexes (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Blocks until the lock for `key` is held and returns its guard.
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_index(key)].lock()
    }

    fn stripe_index<K: Hash + ?Sized>(&self, key: &K) -> usize {
        shard_index(key, self.stripes.len())
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

/// Maps `key` onto `0..shards` by hash.
pub(crate) fn shard_index<K: Hash + ?Sized>(key: &K, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)] // Reduced modulo shards, which is a usize
    let index = (hasher.finish() % shards as u64) as usize;
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_key_same_stripe() {
        let locks = KeyedLocks::new(8);
        assert_eq!(locks.stripe_index("temp_2024-05-01"), locks.stripe_index("temp_2024-05-01"));
        assert!(locks.stripe_index("humidity_2024-05-01") < 8);
    }

    #[test]
    fn test_zero_stripes_clamped() {
        let locks = KeyedLocks::new(0);
        assert_eq!(locks.stripes.len(), 1);
        drop(locks.lock("anything"));
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let _guard = locks.lock("temp");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
