//! Memo Cache - in-process caching for async services
//!
//! Provides an LRU cache, a TTL cache with lazy expiry, argument-keyed
//! memoization of async calls and per-subject rate limiting.

pub mod cache;
pub mod clock;
pub mod collections;
pub mod config;
pub mod error;
pub mod memo;
pub mod rate_limit;

pub use cache::{BoundedCache, Capacity, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memo::{ArgValue, CallKey, CoalescePolicy, Memoized, Opaque, SubjectMemoized};
pub use rate_limit::{RateLimitRegistry, SharedRegistry};
