//! Process-lifetime memoization of read-only queries.
//!
//! Unbounded. The single mutex is never held while a producer runs, so two
//! callers racing on one key may both compute it; the later insert wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Hit/miss counters of a [`Memo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock leaves the map itself consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Return the cached value for `key`, or run `produce` and cache its
    /// success. Failures are returned as-is and not cached, so the next call
    /// tries again.
    pub fn get_or_try_insert_with<E>(&self, key: K, produce: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(v);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let v = produce()?;
        self.lock().insert(key, v.clone());
        Ok(v)
    }

    /// Infallible variant of [`Memo::get_or_try_insert_with`].
    pub fn get_or_insert_with(&self, key: K, produce: impl FnOnce() -> V) -> V {
        match self.get_or_try_insert_with::<std::convert::Infallible>(key, || Ok(produce())) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn second_call_with_same_key_does_not_recompute() {
        let memo: Memo<u16, String> = Memo::new();
        let calls = Cell::new(0);
        let produce = || {
            calls.set(calls.get() + 1);
            "agb".to_string()
        };
        assert_eq!(memo.get_or_insert_with(2021, produce), "agb");
        assert_eq!(memo.get_or_insert_with(2021, produce), "agb");
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.stats(), MemoStats { hits: 1, misses: 1, entries: 1 });
    }

    #[test]
    fn distinct_keys_are_cached_separately() {
        let memo: Memo<u16, u16> = Memo::new();
        assert_eq!(memo.get_or_insert_with(2021, || 1), 1);
        assert_eq!(memo.get_or_insert_with(2022, || 2), 2);
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let memo: Memo<&str, u32> = Memo::new();
        let r: Result<u32, &str> = memo.get_or_try_insert_with("k", || Err("offline"));
        assert_eq!(r, Err("offline"));
        assert!(memo.is_empty());
        assert_eq!(memo.get_or_try_insert_with::<&str>("k", || Ok(7)), Ok(7));
        assert_eq!(memo.get(&"k"), Some(7));
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let memo: Memo<u8, u8> = Memo::new();
        memo.get_or_insert_with(1, || 1);
        memo.get_or_insert_with(1, || 1);
        memo.clear();
        assert_eq!(memo.stats(), MemoStats::default());
    }

    #[test]
    fn shared_across_threads() {
        let memo: Memo<u8, u8> = Memo::new();
        std::thread::scope(|s| {
            for i in 0..4u8 {
                let memo = &memo;
                s.spawn(move || memo.get_or_insert_with(i % 2, || i % 2));
            }
        });
        assert_eq!(memo.len(), 2);
    }
}
