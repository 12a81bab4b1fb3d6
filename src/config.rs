//! Configuration Module
//!
//! Handles loading cache settings from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{Capacity, TtlCache};
use crate::error::{CacheError, Result};
use crate::memo::CoalescePolicy;
use crate::rate_limit::RateLimitRegistry;

/// Default entry TTL in seconds
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries per cache
    pub capacity: Capacity,
    /// TTL for memoized results, None = expire only through eviction
    pub default_ttl: Option<Duration>,
    /// Cooldown for subjects without their own duration
    pub rate_limit_ttl: Option<Duration>,
    /// Handling of concurrent misses on one key
    pub coalesce: CoalescePolicy,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// Unparseable values fall back to their defaults.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum entries, `0` = unbounded (default: 1024)
    /// - `CACHE_DEFAULT_TTL` - Memo TTL in seconds, `0` = never (default: 60)
    /// - `RATE_LIMIT_DEFAULT_TTL` - Cooldown in seconds, `0` = never (default: 60)
    /// - `CACHE_COALESCE` - `independent` or `single_flight` (default: independent)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but rejects malformed values.
    pub fn try_from_env() -> Result<Self> {
        Self::try_from_lookup(|name| env::var(name).ok())
    }

    /// Lenient load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            capacity: lookup("CACHE_MAX_ENTRIES")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|v| Capacity::from_signed(v).ok())
                .unwrap_or(defaults.capacity),
            default_ttl: lookup("CACHE_DEFAULT_TTL")
                .and_then(|v| v.trim().parse().ok())
                .map(ttl_from_secs)
                .unwrap_or(defaults.default_ttl),
            rate_limit_ttl: lookup("RATE_LIMIT_DEFAULT_TTL")
                .and_then(|v| v.trim().parse().ok())
                .map(ttl_from_secs)
                .unwrap_or(defaults.rate_limit_ttl),
            coalesce: lookup("CACHE_COALESCE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.coalesce),
        }
    }

    /// Strict load from an arbitrary variable source.
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let capacity = match lookup("CACHE_MAX_ENTRIES") {
            Some(raw) => Capacity::from_signed(parse_var("CACHE_MAX_ENTRIES", &raw)?)?,
            None => defaults.capacity,
        };
        let default_ttl = match lookup("CACHE_DEFAULT_TTL") {
            Some(raw) => ttl_from_secs(parse_var("CACHE_DEFAULT_TTL", &raw)?),
            None => defaults.default_ttl,
        };
        let rate_limit_ttl = match lookup("RATE_LIMIT_DEFAULT_TTL") {
            Some(raw) => ttl_from_secs(parse_var("RATE_LIMIT_DEFAULT_TTL", &raw)?),
            None => defaults.rate_limit_ttl,
        };
        let coalesce = match lookup("CACHE_COALESCE") {
            Some(raw) => raw.parse()?,
            None => defaults.coalesce,
        };

        Ok(Self {
            capacity,
            default_ttl,
            rate_limit_ttl,
            coalesce,
        })
    }

    /// Builds a memo cache from these settings.
    pub fn ttl_cache<K, V>(&self) -> TtlCache<K, V>
    where
        K: std::hash::Hash + Eq + Clone + std::fmt::Debug,
    {
        TtlCache::new(self.capacity, self.default_ttl)
    }

    /// Builds a rate-limit registry from these settings.
    pub fn rate_limit_registry<K, V>(&self) -> RateLimitRegistry<K, V>
    where
        K: std::hash::Hash + Eq + Clone + std::fmt::Debug,
    {
        RateLimitRegistry::new(self.capacity, self.rate_limit_ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::default(),
            default_ttl: Some(Duration::from_secs(DEFAULT_TTL_SECS)),
            rate_limit_ttl: Some(Duration::from_secs(DEFAULT_TTL_SECS)),
            coalesce: CoalescePolicy::Independent,
        }
    }
}

/// Zero seconds means "never expire".
fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::InvalidConfig(format!("{name}={raw:?}")))
}
