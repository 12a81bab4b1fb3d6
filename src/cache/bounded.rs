//! Bounded Cache Module
//!
//! Fixed-capacity key-value store with least-recently-used eviction.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use crate::cache::{CacheStats, Capacity, LruTracker};
use crate::error::{CacheError, Result};

// == Bounded Cache ==
/// Key-value storage that evicts the least recently used entry on overflow.
///
/// `get` and `set` promote a key to most recently used. `contains` and
/// `peek` leave the recency order untouched.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, V>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Eviction counter and entry count
    stats: CacheStats,
    capacity: Capacity,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    // == Constructor ==
    /// Creates an empty cache with the given capacity.
    pub fn new(capacity: Capacity) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
        }
    }

    /// Creates a cache from a signed capacity setting (`0` = unbounded).
    pub fn with_max_entries(max_entries: i64) -> Result<Self> {
        Ok(Self::new(Capacity::from_signed(max_entries)?))
    }

    // == Get ==
    /// Returns the value and marks the key most recently used.
    pub fn get(&mut self, key: &K) -> Result<&V> {
        if !self.entries.contains_key(key) {
            return Err(CacheError::NotFound(format!("{key:?}")));
        }
        self.lru.touch(key);
        self.entries
            .get(key)
            .ok_or_else(|| CacheError::NotFound(format!("{key:?}")))
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, key: &K) -> Result<&mut V> {
        if !self.entries.contains_key(key) {
            return Err(CacheError::NotFound(format!("{key:?}")));
        }
        self.lru.touch(key);
        self.entries
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(format!("{key:?}")))
    }

    /// Returns the value without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    // == Set ==
    /// Inserts or overwrites a value and marks the key most recently used.
    ///
    /// When a new key pushes the size past capacity, the least recently used
    /// entry is evicted and returned.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.lru.touch(&key);
        self.entries.insert(key, value);

        let evicted = if self.capacity.is_exceeded_by(self.entries.len()) {
            self.evict_oldest()
        } else {
            None
        };

        self.stats.set_total_entries(self.entries.len());
        evicted
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let key = self.lru.evict_oldest()?;
        let value = self.entries.remove(&key)?;
        self.stats.record_eviction();
        trace!(key = ?key, "evicted least recently used entry");
        Some((key, value))
    }

    // == Contains ==
    /// Side-effect-free membership test.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes a key if present; no-op otherwise.
    pub fn delete(&mut self, key: &K) {
        self.remove(key);
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.lru.remove(key);
        self.stats.set_total_entries(self.entries.len());
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    /// Keys ordered from least to most recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> + '_ {
        self.lru.iter_oldest_first()
    }

    /// Iterates entries in arbitrary order without touching recency.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_entries: usize) -> BoundedCache<&'static str, i32> {
        BoundedCache::new(Capacity::bounded(max_entries).unwrap())
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = cache(10);

        assert!(cache.set("key1", 1).is_none());
        assert_eq!(cache.get(&"key1"), Ok(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let mut cache = cache(10);
        assert!(matches!(cache.get(&"nope"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut cache = cache(10);

        cache.set("key1", 1);
        cache.set("key1", 2);

        assert_eq!(cache.get(&"key1"), Ok(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_promotes_before_eviction() {
        let mut cache = cache(2);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.get(&"a").unwrap();
        let evicted = cache.set("c", 3);

        assert_eq!(evicted, Some(("b", 2)));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"a"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_overwrite_promotes() {
        let mut cache = cache(2);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert!(!cache.contains(&"b"));
        assert_eq!(cache.peek(&"a"), Some(&10));
    }

    #[test]
    fn test_contains_and_peek_do_not_promote() {
        let mut cache = cache(2);

        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.contains(&"a"));
        assert_eq!(cache.peek(&"a"), Some(&1));
        cache.set("c", 3);

        assert!(!cache.contains(&"a"), "probing must not refresh recency");
        assert_eq!(cache.keys_by_recency().copied().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn test_delete() {
        let mut cache = cache(2);

        cache.set("a", 1);
        cache.delete(&"a");
        cache.delete(&"missing");

        assert!(cache.is_empty());
        assert_eq!(cache.remove(&"a"), None);
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut cache = BoundedCache::new(Capacity::Unbounded);

        for i in 0..5_000 {
            assert!(cache.set(i, i).is_none());
        }

        assert_eq!(cache.len(), 5_000);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_with_max_entries_rejects_negative() {
        let result = BoundedCache::<u8, u8>::with_max_entries(-5);
        assert!(matches!(result, Err(CacheError::CapacityMisconfiguration(-5))));
    }

    #[test]
    fn test_stats_count_evictions() {
        let mut cache = cache(1);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        let stats = cache.stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut cache = cache(2);

        cache.set("a", 1);
        *cache.get_mut(&"a").unwrap() += 41;

        assert_eq!(cache.peek(&"a"), Some(&42));
    }

    #[test]
    fn test_clear() {
        let mut cache = cache(2);
        cache.set("a", 1);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.keys_by_recency().count(), 0);
    }
}
