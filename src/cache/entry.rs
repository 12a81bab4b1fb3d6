//! Cache Entry Module
//!
//! Wraps a stored value with an optional absolute expiry timestamp.

use std::time::Duration;

// == Expiring Entry ==
/// A stored value plus expiry metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiringEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl<V> ExpiringEntry<V> {
    // == Constructor ==
    /// Creates an entry stamped at `now_ms` with an optional TTL.
    pub fn new(value: V, ttl: Option<Duration>, now_ms: u64) -> Self {
        let expires_at = ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now_ms.saturating_add(ttl_ms)
        });

        Self {
            value,
            created_at: now_ms,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now_ms`.
    ///
    /// Boundary condition: the entry is still live at exactly `expires_at`
    /// and expired once the clock has moved past it.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms > expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL as of `now_ms`, or None if no expiration is set.
    ///
    /// - `Some(Duration::ZERO)` once the TTL has elapsed
    pub fn ttl_remaining_at(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at
            .map(|expires| Duration::from_millis(expires.saturating_sub(now_ms)))
    }

    /// Time since the entry was written, as of `now_ms`.
    pub fn age_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.created_at))
    }

    /// Consumes the entry, returning the stored value.
    pub fn into_value(self) -> V {
        self.value
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = ExpiringEntry::new("test_value", None, 1_000);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.created_at, 1_000);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = ExpiringEntry::new(7, Some(Duration::from_secs(60)), 1_000);

        assert_eq!(entry.expires_at, Some(61_000));
        assert!(!entry.is_expired_at(1_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = ExpiringEntry::new((), Some(Duration::from_secs(10)), 0);

        assert!(!entry.is_expired_at(9_999));
        assert!(!entry.is_expired_at(10_000), "Entry is live at its expiry instant");
        assert!(entry.is_expired_at(10_001));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = ExpiringEntry::new((), Some(Duration::from_secs(10)), 0);

        assert_eq!(entry.ttl_remaining_at(4_000), Some(Duration::from_secs(6)));
        assert_eq!(entry.ttl_remaining_at(20_000), Some(Duration::ZERO));
        assert_eq!(ExpiringEntry::new((), None, 0).ttl_remaining_at(5), None);
    }

    #[test]
    fn test_age() {
        let entry = ExpiringEntry::new((), None, 2_000);
        assert_eq!(entry.age_at(2_500), Duration::from_millis(500));
        assert_eq!(entry.age_at(1_000), Duration::ZERO);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = ExpiringEntry::new((), Some(Duration::MAX), 5);
        assert_eq!(entry.expires_at, Some(u64::MAX));
        assert!(!entry.is_expired_at(u64::MAX));
    }
}
