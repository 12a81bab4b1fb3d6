//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for caches, call keys and memoized calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key was present but its TTL had elapsed
    #[error("Key expired: {0}")]
    Expired(String),

    /// Capacity that is neither positive nor the unbounded sentinel
    #[error("Invalid cache capacity: {0}")]
    CapacityMisconfiguration(i64),

    /// Call argument that cannot be turned into a structural key
    #[error("Unhashable argument: {0}")]
    UnhashableArgument(String),

    /// Per-subject call without a positional argument at the subject index
    #[error("No positional argument at subject index {index}")]
    MissingSubject { index: usize },

    /// Malformed configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CacheError::NotFound("\"a\"".to_string()).to_string(),
            "Key not found: \"a\""
        );
        assert_eq!(
            CacheError::CapacityMisconfiguration(-3).to_string(),
            "Invalid cache capacity: -3"
        );
        assert_eq!(
            CacheError::MissingSubject { index: 2 }.to_string(),
            "No positional argument at subject index 2"
        );
    }
}
