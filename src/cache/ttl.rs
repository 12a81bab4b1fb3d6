//! TTL Cache Module
//!
//! Capacity-bounded, time-bounded storage with lazy expiry.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::cache::{BoundedCache, CacheStats, Capacity, ExpiringEntry};
use crate::clock::{system_clock, Clock};
use crate::error::{CacheError, Result};

// == TTL Cache ==
/// LRU cache whose entries also expire after a time-to-live.
///
/// Expiry is lazy: an expired entry lingers until a probe or read finds it,
/// at which point it is purged and reported absent. There is no background
/// sweep; [`purge_expired`](Self::purge_expired) is available for callers
/// that want one.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: BoundedCache<K, ExpiringEntry<V>>,
    /// TTL applied when `set` gets no override, None = never expire by time
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    // == Constructor ==
    /// Creates a cache backed by the system clock.
    pub fn new(capacity: Capacity, default_ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, default_ttl, system_clock())
    }

    /// Creates a cache with an injected clock.
    pub fn with_clock(
        capacity: Capacity,
        default_ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: BoundedCache::new(capacity),
            default_ttl: non_zero(default_ttl),
            clock,
        }
    }

    // == Contains ==
    /// Expiry-aware membership test.
    ///
    /// Unlike [`BoundedCache::contains`] this purges the entry when its TTL
    /// has elapsed, so a stale key is never observably present.
    pub fn contains(&mut self, key: &K) -> bool {
        let live = self.probe(key) == Liveness::Live;
        if live {
            self.inner.stats_mut().record_hit();
        } else {
            self.inner.stats_mut().record_miss();
        }
        live
    }

    // == Get ==
    /// Returns the unwrapped value and promotes recency.
    ///
    /// Callers normally probe with [`contains`](Self::contains) first; an
    /// entry that expired in between is purged and reported as `Expired`.
    pub fn get(&mut self, key: &K) -> Result<&V> {
        match self.probe(key) {
            Liveness::Live => self.inner.get(key).map(|entry| &entry.value),
            Liveness::Expired => Err(CacheError::Expired(format!("{key:?}"))),
            Liveness::Absent => Err(CacheError::NotFound(format!("{key:?}"))),
        }
    }

    // == Set ==
    /// Stores a value. A non-zero `ttl_override` takes precedence over the
    /// default TTL; a zero override counts as unset. With neither, the entry
    /// only leaves through eviction or deletion.
    ///
    /// Returns the entry evicted to make room, if any.
    pub fn set(&mut self, key: K, value: V, ttl_override: Option<Duration>) -> Option<(K, V)> {
        let ttl = non_zero(ttl_override).or(self.default_ttl);
        let entry = ExpiringEntry::new(value, ttl, self.clock.now_ms());
        self.inner
            .set(key, entry)
            .map(|(key, entry)| (key, entry.into_value()))
    }

    // == Delete ==
    /// Removes a key if present; no-op otherwise.
    pub fn delete(&mut self, key: &K) {
        self.inner.delete(key);
    }

    /// Removes a key, returning its value whether or not it had expired.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key).map(ExpiringEntry::into_value)
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<K> = self
            .inner
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.inner.delete(key);
            self.inner.stats_mut().record_expiration();
        }

        if !expired.is_empty() {
            trace!(count = expired.len(), "purged expired entries");
        }
        expired.len()
    }

    /// Remaining lifetime of a live entry; None for absent or non-expiring keys.
    pub fn ttl_remaining(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.inner
            .peek(key)
            .filter(|entry| !entry.is_expired_at(now))
            .and_then(|entry| entry.ttl_remaining_at(now))
    }

    /// Time since a live entry was written.
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.inner
            .peek(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.age_at(now))
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Changes the TTL for future writes. Existing entries keep their expiry.
    pub fn set_default_ttl(&mut self, ttl: Option<Duration>) {
        self.default_ttl = non_zero(ttl);
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.inner.capacity()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // == Lazy Expiry ==
    /// Classifies `key`, purging it when its TTL has elapsed.
    fn probe(&mut self, key: &K) -> Liveness {
        let now = self.clock.now_ms();
        let (expired, age) = match self.inner.peek(key) {
            Some(entry) => (entry.is_expired_at(now), entry.age_at(now)),
            None => return Liveness::Absent,
        };

        if expired {
            self.inner.delete(key);
            self.inner.stats_mut().record_expiration();
            trace!(key = ?key, age_ms = age.as_millis() as u64, "purged expired entry");
            Liveness::Expired
        } else {
            Liveness::Live
        }
    }
}

/// A zero duration means "no TTL given".
pub(crate) fn non_zero(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Live,
    Expired,
    Absent,
}
