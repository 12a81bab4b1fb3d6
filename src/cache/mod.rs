//! Cache Module
//!
//! Provides in-memory caching with LRU eviction and lazy TTL expiration.

mod bounded;
mod entry;
mod lru;
mod stats;
mod ttl;


use std::num::NonZeroUsize;

use crate::error::{CacheError, Result};

// Re-export public types
pub use bounded::BoundedCache;
pub use entry::ExpiringEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use ttl::TtlCache;
pub(crate) use ttl::non_zero;

// == Public Constants ==
/// Capacity used when none is configured
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

// == Capacity ==
/// Maximum number of entries a cache may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Evict the least recently used entry once this many are stored
    Bounded(NonZeroUsize),
    /// Never evict; size grows without bound
    Unbounded,
}

impl Capacity {
    /// Creates a finite capacity. Zero is rejected.
    pub fn bounded(max_entries: usize) -> Result<Self> {
        NonZeroUsize::new(max_entries)
            .map(Self::Bounded)
            .ok_or(CacheError::CapacityMisconfiguration(0))
    }

    /// Interprets a signed setting: `0` is the unbounded sentinel,
    /// negative values are misconfiguration.
    pub fn from_signed(max_entries: i64) -> Result<Self> {
        match max_entries {
            0 => Ok(Self::Unbounded),
            n if n < 0 => Err(CacheError::CapacityMisconfiguration(n)),
            n => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Self::Bounded)
                .ok_or(CacheError::CapacityMisconfiguration(n)),
        }
    }

    /// Returns the entry limit, or None when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }

    /// True when holding `len` entries is over the limit.
    pub fn is_exceeded_by(&self, len: usize) -> bool {
        self.limit().is_some_and(|limit| len > limit)
    }
}

impl Default for Capacity {
    fn default() -> Self {
        NonZeroUsize::new(DEFAULT_MAX_ENTRIES)
            .map(Self::Bounded)
            .unwrap_or(Self::Unbounded)
    }
}

impl TryFrom<i64> for Capacity {
    type Error = CacheError;

    fn try_from(value: i64) -> Result<Self> {
        Self::from_signed(value)
    }
}
