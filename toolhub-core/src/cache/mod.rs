//! Tiered, namespaced caching over a pluggable key-value store
//!
//! The cache sorts content into [`DataClass`]es, each with a default TTL
//! [`CacheLevel`] and a maximum entry count. Every operation is fail-open:
//! a broken backend behaves like an empty cache and never surfaces an error
//! to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolhub_core::cache::{CacheLevel, DataClass, MemoryStore, TieredCache};
//!
//! # async fn demo() {
//! let cache = TieredCache::new(Arc::new(MemoryStore::new()));
//! cache
//!     .set("user:42", &serde_json::json!({"plan": "pro"}), DataClass::AgentState, Some(CacheLevel::L2), None)
//!     .await;
//! let hit = cache.get("user:42", DataClass::AgentState).await;
//! # }
//! ```

pub mod key;
mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;
mod store;
mod tiered;

pub use key::{canonical_json, hashed_key, tool_cache_key};
pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, StoreError, StoreResult};
pub use tiered::{
    CacheLevel, CacheStats, CachedCall, DataClass, DataClassPolicy, KeyBuilder, TieredCache,
    UnknownDataClass,
};
