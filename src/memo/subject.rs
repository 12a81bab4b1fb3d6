//! Per-subject memoization backed by a rate-limit registry.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::memo::key::positional_args;
use crate::rate_limit::SharedRegistry;

// == Subject Memoized ==
/// Wraps an async function so results are cached per subject.
///
/// The subject is the positional argument at index `skip` (for example the
/// user id following a context argument). Each stored result lives for the
/// subject's configured duration in the registry, or the registry default.
pub struct SubjectMemoized<F, S, V> {
    func: F,
    registry: SharedRegistry<S, V>,
    skip: usize,
}

impl<F, S, V> SubjectMemoized<F, S, V>
where
    S: DeserializeOwned + Hash + Eq + Clone + Debug,
    V: Clone,
{
    pub fn new(registry: SharedRegistry<S, V>, skip: usize, func: F) -> Self {
        Self {
            func,
            registry,
            skip,
        }
    }

    pub fn registry(&self) -> &SharedRegistry<S, V> {
        &self.registry
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub async fn call<A, Fut, E>(&self, args: A) -> Result<V, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        self.call_with(args, true).await
    }

    /// Calls with an explicit `use_cache` flag; a bypassed call still
    /// stores its fresh result.
    pub async fn call_with<A, Fut, E>(&self, args: A, use_cache: bool) -> Result<V, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        let subject = self.subject_of(&args)?;

        if use_cache {
            let mut registry = self.registry.lock().await;
            if let Some(value) = registry.get(&subject) {
                trace!(subject = ?subject, "subject memo hit");
                return Ok(value.clone());
            }
        }

        debug!(subject = ?subject, use_cache, "subject memo computing");
        let value = (self.func)(args).await?;

        // Duration is looked up now, not when the call started
        self.registry.lock().await.store(subject, value.clone());
        Ok(value)
    }

    fn subject_of<A: Serialize>(&self, args: &A) -> Result<S, CacheError> {
        let mut positional = positional_args(args)?;
        if self.skip >= positional.len() {
            return Err(CacheError::MissingSubject { index: self.skip });
        }
        let value = positional.swap_remove(self.skip);
        serde_json::to_value(&value)
            .and_then(serde_json::from_value)
            .map_err(|e| CacheError::UnhashableArgument(e.to_string()))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use crate::cache::Capacity;
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimitRegistry;

    fn registry(default_ttl: u64) -> (SharedRegistry<u64, String>, ManualClock) {
        let clock = ManualClock::new(0);
        let registry = RateLimitRegistry::with_clock(
            Capacity::bounded(64).unwrap(),
            Some(Duration::from_secs(default_ttl)),
            Arc::new(clock.clone()),
        );
        (Arc::new(Mutex::new(registry)), clock)
    }

    #[tokio::test]
    async fn test_keyed_by_subject_only() {
        let calls = AtomicUsize::new(0);
        let (registry, _) = registry(60);
        let memo = SubjectMemoized::new(registry, 1, |(channel, user): (&str, u64)| {
            calls.fetch_add(1, Ordering::SeqCst);
            let reply = format!("{channel}:{user}");
            async move { Ok::<_, CacheError>(reply) }
        });

        assert_eq!(memo.call(("general", 7)).await.unwrap(), "general:7");
        // Different channel, same subject: served from cache
        assert_eq!(memo.call(("random", 7)).await.unwrap(), "general:7");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        memo.call(("general", 8)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subject_duration_applies_at_store_time() {
        let calls = AtomicUsize::new(0);
        let (registry, clock) = registry(60);
        registry.lock().await.set_duration(7, Duration::from_secs(5));

        let memo = SubjectMemoized::new(registry, 0, |user: (u64,)| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, CacheError>(user.0.to_string()) }
        });

        memo.call((7,)).await.unwrap();
        memo.call((8,)).await.unwrap();
        clock.advance_secs(6);

        memo.call((7,)).await.unwrap();
        memo.call((8,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3, "only subject 7 expired");
    }

    #[tokio::test]
    async fn test_bypass_still_stores() {
        let calls = AtomicUsize::new(0);
        let (registry, _) = registry(60);
        let memo = SubjectMemoized::new(registry.clone(), 0, |user: (u64,)| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, CacheError>(format!("{}#{n}", user.0)) }
        });

        memo.call((1,)).await.unwrap();
        assert_eq!(memo.call_with((1,), false).await.unwrap(), "1#1");
        assert_eq!(memo.call((1,)).await.unwrap(), "1#1");
        assert!(registry.lock().await.is_active(&1));
    }

    #[tokio::test]
    async fn test_missing_subject() {
        let (registry, _) = registry(60);
        let memo = SubjectMemoized::new(registry, 2, |_: (u64,)| async move {
            Ok::<_, CacheError>(String::new())
        });

        assert_eq!(
            memo.call((1,)).await,
            Err(CacheError::MissingSubject { index: 2 })
        );
    }

    #[tokio::test]
    async fn test_subject_type_mismatch() {
        let (registry, _) = registry(60);
        let memo = SubjectMemoized::new(registry, 0, |_: (&str,)| async move {
            Ok::<_, CacheError>(String::new())
        });

        assert!(matches!(
            memo.call(("not-a-number",)).await,
            Err(CacheError::UnhashableArgument(_))
        ));
    }
}
