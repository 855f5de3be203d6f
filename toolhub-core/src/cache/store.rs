//! Key-value store abstraction consumed by the tiered cache

use async_trait::async_trait;
use std::time::Duration;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by key-value store backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed an operation
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// Key pattern could not be compiled
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Minimal key-value contract needed by [`TieredCache`](super::TieredCache)
///
/// Single-key operations are assumed to be atomic; no cross-key
/// transactions are required.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Delete a value or set; returns whether anything was removed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check whether a value exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// List value keys matching a glob pattern (`*` and `?` wildcards)
    async fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Add a member to a set
    async fn add_to_set(&self, set_key: &str, member: &str) -> StoreResult<()>;

    /// Remove a member from a set; returns whether it was present
    async fn remove_from_set(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// Number of members in a set
    async fn set_cardinality(&self, set_key: &str) -> StoreResult<usize>;

    /// All members of a set
    async fn set_members(&self, set_key: &str) -> StoreResult<Vec<String>>;

    /// Time until a value expires
    ///
    /// `None` when the key is missing or carries no expiry.
    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Duration>>;
}
