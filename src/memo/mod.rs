//! Memoization Module
//!
//! Wrappers that reuse the result of an async call for equal arguments.
//!
//! Concurrent calls for the same key are not merged unless the wrapper is
//! configured with [`CoalescePolicy::SingleFlight`]; by default each call
//! that misses computes on its own and the last write wins.

mod capture;
mod key;
mod memoized;
mod subject;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{Capacity, TtlCache};
use crate::error::CacheError;

pub use capture::{ArgValue, CaptureError};
pub use key::{CallKey, CallKeyBuilder, Opaque, USE_CACHE_FLAG};
pub use memoized::Memoized;
pub use subject::SubjectMemoized;

/// A TTL cache shared between call sites.
pub type SharedTtlCache<K, V> = Arc<Mutex<TtlCache<K, V>>>;

/// Creates a shared memoization cache backed by the system clock.
pub fn shared_cache<V>(capacity: Capacity, default_ttl: Option<Duration>) -> SharedTtlCache<CallKey, V> {
    Arc::new(Mutex::new(TtlCache::new(capacity, default_ttl)))
}

// == Coalesce Policy ==
/// How concurrent misses on the same key are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoalescePolicy {
    /// Every miss computes independently; the last result stored wins
    #[default]
    Independent,
    /// One computation per key at a time; later callers reuse its result
    SingleFlight,
}

impl FromStr for CoalescePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(Self::Independent),
            "single_flight" | "singleflight" => Ok(Self::SingleFlight),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown coalesce policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for CoalescePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Independent => f.write_str("independent"),
            Self::SingleFlight => f.write_str("single_flight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce_policy_parse() {
        assert_eq!("independent".parse::<CoalescePolicy>(), Ok(CoalescePolicy::Independent));
        assert_eq!(" Single_Flight ".parse::<CoalescePolicy>(), Ok(CoalescePolicy::SingleFlight));
        assert!(matches!(
            "sometimes".parse::<CoalescePolicy>(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_coalesce_policy_display_round_trips() {
        for policy in [CoalescePolicy::Independent, CoalescePolicy::SingleFlight] {
            assert_eq!(policy.to_string().parse::<CoalescePolicy>(), Ok(policy));
        }
    }
}
