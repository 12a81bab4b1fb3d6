//! Rate Limit Module
//!
//! Per-subject cooldowns on top of the TTL cache.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{non_zero, BoundedCache, CacheStats, Capacity, TtlCache};
use crate::clock::{system_clock, Clock};

/// A registry shared between call sites.
pub type SharedRegistry<K, V = ()> = Arc<Mutex<RateLimitRegistry<K, V>>>;

// == Rate Limit Registry ==
/// TTL cache where each subject may carry its own expiry duration.
///
/// A subject with a live entry is "active", meaning a repeated action
/// should be throttled. Subjects without a configured duration use the
/// registry default.
///
/// Configured durations share the registry capacity: once more subjects
/// than that have their own duration, the least recently configured one
/// falls back to the default.
#[derive(Debug)]
pub struct RateLimitRegistry<K, V = ()> {
    cache: TtlCache<K, V>,
    durations: BoundedCache<K, Duration>,
}

impl<K, V> RateLimitRegistry<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    // == Constructor ==
    pub fn new(capacity: Capacity, default_ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, default_ttl, system_clock())
    }

    pub fn with_clock(
        capacity: Capacity,
        default_ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache: TtlCache::with_clock(capacity, default_ttl, clock),
            durations: BoundedCache::new(capacity),
        }
    }

    /// Wraps the registry for sharing.
    pub fn shared(self) -> SharedRegistry<K, V> {
        Arc::new(Mutex::new(self))
    }

    // == Durations ==
    /// Records the cooldown for `subject`. Entries already stored keep
    /// their original expiry. A zero duration defers to the default.
    pub fn set_duration(&mut self, subject: K, duration: Duration) {
        debug!(subject = ?subject, secs = duration.as_secs_f64(), "cooldown configured");
        if let Some((dropped, _)) = self.durations.set(subject, duration) {
            debug!(subject = ?dropped, "cooldown dropped, registry full");
        }
    }

    /// Drops a subject's own duration so it falls back to the default.
    pub fn clear_duration(&mut self, subject: &K) -> Option<Duration> {
        self.durations.remove(subject)
    }

    /// Effective duration for `subject`; None means entries never expire.
    pub fn duration_for(&self, subject: &K) -> Option<Duration> {
        non_zero(self.durations.peek(subject).copied()).or(self.cache.default_ttl())
    }

    // == Activity ==
    /// True iff `subject` has a live entry.
    pub fn is_active(&mut self, subject: &K) -> bool {
        self.cache.contains(subject)
    }

    /// Stores `value` for `subject` under its effective duration.
    pub fn store(&mut self, subject: K, value: V) {
        let ttl = self.duration_for(&subject);
        self.cache.set(subject, value, ttl);
    }

    /// Value of a live entry.
    pub fn get(&mut self, subject: &K) -> Option<&V> {
        if !self.cache.contains(subject) {
            return None;
        }
        self.cache.get(subject).ok()
    }

    /// Ends a subject's cooldown early. Its configured duration is kept.
    pub fn forget(&mut self, subject: &K) {
        self.cache.delete(subject);
    }

    /// Time until `subject` stops being active.
    pub fn remaining(&self, subject: &K) -> Option<Duration> {
        self.cache.ttl_remaining(subject)
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.cache.default_ttl()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl<K, V> RateLimitRegistry<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Default,
{
    /// Starts or refreshes `subject`'s cooldown.
    pub fn record(&mut self, subject: K) {
        self.store(subject, V::default());
    }

    /// Checks and records in one step. Returns true when the action should
    /// be throttled; otherwise starts a new cooldown.
    pub fn check_and_record(&mut self, subject: K) -> bool {
        if self.is_active(&subject) {
            debug!(subject = ?subject, "throttled");
            return true;
        }
        self.record(subject);
        false
    }
}
