//! Argument-keyed memoization of async calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::memo::{CallKey, CoalescePolicy, SharedTtlCache};

// == Memoized ==
/// Wraps an async function so equal arguments reuse a cached result.
///
/// The key is the [`CallKey`] of the whole argument bundle. Only successful
/// results are stored; errors pass through untouched. Entries expire after
/// the cache's default TTL unless the wrapper sets its own.
pub struct Memoized<F, V> {
    func: F,
    cache: SharedTtlCache<CallKey, V>,
    /// Overrides the cache default for entries written by this wrapper
    ttl: Option<Duration>,
    policy: CoalescePolicy,
    in_flight: InFlight,
}

impl<F, V> Memoized<F, V>
where
    V: Clone,
{
    pub fn new(cache: SharedTtlCache<CallKey, V>, func: F) -> Self {
        Self {
            func,
            cache,
            ttl: None,
            policy: CoalescePolicy::default(),
            in_flight: InFlight::default(),
        }
    }

    pub fn with_policy(mut self, policy: CoalescePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn cache(&self) -> &SharedTtlCache<CallKey, V> {
        &self.cache
    }

    pub fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    /// Calls through the cache.
    pub async fn call<A, Fut, E>(&self, args: A) -> Result<V, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        self.call_with(args, true).await
    }

    /// Calls with an explicit `use_cache` flag.
    ///
    /// With `use_cache == false` the cached value is ignored but the fresh
    /// result is still written back.
    pub async fn call_with<A, Fut, E>(&self, args: A, use_cache: bool) -> Result<V, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        let key = CallKey::from_call(&args)?;

        if use_cache {
            if let Some(value) = self.cached(&key).await {
                trace!(key = ?key, "memo hit");
                return Ok(value);
            }
        }

        match self.policy {
            CoalescePolicy::Independent => self.compute(key, args, use_cache).await,
            CoalescePolicy::SingleFlight => {
                let gate = self.in_flight.join(&key);
                let _permit = gate.slot.lock().await;

                // A leader may have finished while we waited
                if use_cache {
                    if let Some(value) = self.cached(&key).await {
                        debug!(key = ?key, "reused in-flight result");
                        return Ok(value);
                    }
                }
                self.compute(key, args, use_cache).await
            }
        }
    }

    async fn cached(&self, key: &CallKey) -> Option<V> {
        let mut cache = self.cache.lock().await;
        if !cache.contains(key) {
            return None;
        }
        cache.get(key).ok().cloned()
    }

    async fn compute<A, Fut, E>(&self, key: CallKey, args: A, use_cache: bool) -> Result<V, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if use_cache {
            debug!(key = ?key, "memo miss");
        } else {
            debug!(key = ?key, "memo refresh");
        }

        let value = (self.func)(args).await?;

        let evicted = self.cache.lock().await.set(key, value.clone(), self.ttl);
        if let Some((evicted_key, _)) = evicted {
            trace!(key = ?evicted_key, "memo entry evicted");
        }
        Ok(value)
    }
}

// == In-Flight Registry ==
/// Per-key gates used by single-flight calls.
#[derive(Default)]
struct InFlight {
    slots: StdMutex<HashMap<CallKey, Arc<Mutex<()>>>>,
}

impl InFlight {
    fn join(&self, key: &CallKey) -> InFlightGuard<'_> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key.clone()).or_default().clone();
        InFlightGuard {
            registry: self,
            key: key.clone(),
            slot,
        }
    }
}

/// Holds a key's gate; the last holder removes it from the registry.
struct InFlightGuard<'a> {
    registry: &'a InFlight,
    key: CallKey,
    slot: Arc<Mutex<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in this guard
        if Arc::strong_count(&self.slot) <= 2 {
            slots.remove(&self.key);
        }
    }
}
