//! Multi-level cache with per-data-class size bounds
//!
//! Physical layout in the backing store:
//! - values live under `{prefix}:{data_class}:{key}`
//! - every (data class, level) pair owns an index set under
//!   `{prefix}_index:{data_class}:{level}` listing the physical keys written
//!   at that level. The index exists for bounded-size eviction and bulk
//!   clearing only; reads never consult it.

use super::key::{canonical_json, hashed_key};
use super::store::KeyValueStore;
use crate::config::CacheConfig;
use crate::error::{Result, ToolHubError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// TTL tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// 60 seconds
    #[serde(alias = "L1")]
    L1,
    /// 5 minutes
    #[serde(alias = "L2")]
    L2,
    /// 1 hour
    #[serde(alias = "L3")]
    L3,
    /// 24 hours
    #[serde(alias = "PERMANENT")]
    Permanent,
}

impl CacheLevel {
    /// Every level, shortest TTL first
    pub fn all() -> &'static [CacheLevel] {
        &[
            CacheLevel::L1,
            CacheLevel::L2,
            CacheLevel::L3,
            CacheLevel::Permanent,
        ]
    }

    /// Default TTL for entries written at this level
    pub fn ttl(&self) -> Duration {
        match self {
            CacheLevel::L1 => Duration::from_secs(60),
            CacheLevel::L2 => Duration::from_secs(300),
            CacheLevel::L3 => Duration::from_secs(3600),
            CacheLevel::Permanent => Duration::from_secs(86400),
        }
    }

    /// Get the string name of this level
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::L1 => "l1",
            CacheLevel::L2 => "l2",
            CacheLevel::L3 => "l3",
            CacheLevel::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of cached content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    /// Durable business records mirrored from the document store
    GeneralRecord,
    /// Short-lived agent session state
    AgentState,
    /// Embedding vectors
    Vector,
    /// Raw responses from third-party APIs
    ExternalApi,
    /// Envelopes produced by tool execution
    ToolResult,
    /// Workflow progress snapshots
    WorkflowState,
}

impl DataClass {
    /// Every data class
    pub fn all() -> &'static [DataClass] {
        &[
            DataClass::GeneralRecord,
            DataClass::AgentState,
            DataClass::Vector,
            DataClass::ExternalApi,
            DataClass::ToolResult,
            DataClass::WorkflowState,
        ]
    }

    /// Get the string name of this data class
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::GeneralRecord => "general_record",
            DataClass::AgentState => "agent_state",
            DataClass::Vector => "vector",
            DataClass::ExternalApi => "external_api",
            DataClass::ToolResult => "tool_result",
            DataClass::WorkflowState => "workflow_state",
        }
    }

    /// Built-in level and size bound
    pub fn default_policy(&self) -> DataClassPolicy {
        let (default_level, max_size) = match self {
            DataClass::GeneralRecord => (CacheLevel::L2, 10_000),
            DataClass::AgentState => (CacheLevel::L1, 1_000),
            DataClass::Vector => (CacheLevel::L3, 5_000),
            DataClass::ExternalApi => (CacheLevel::L2, 2_000),
            DataClass::ToolResult => (CacheLevel::L2, 5_000),
            DataClass::WorkflowState => (CacheLevel::L3, 1_000),
        };
        DataClassPolicy {
            default_level,
            max_size,
        }
    }
}

impl std::fmt::Display for DataClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown data class name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data class '{0}'")]
pub struct UnknownDataClass(pub String);

impl FromStr for DataClass {
    type Err = UnknownDataClass;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DataClass::all()
            .iter()
            .copied()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| UnknownDataClass(s.to_string()))
    }
}

/// Default level and size bound for a data class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataClassPolicy {
    /// Level used when a write names none
    pub default_level: CacheLevel,
    /// Maximum entries per (data class, level) index
    pub max_size: usize,
}

/// Index cardinalities for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Sum over every index
    pub total_entries: usize,
    /// Entries per level across all data classes
    pub by_level: BTreeMap<CacheLevel, usize>,
    /// Entries per data class and level
    pub by_data_class: BTreeMap<DataClass, BTreeMap<CacheLevel, usize>>,
}

/// Custom key builder for [`CachedCall`]: `(identity, args) -> key`
pub type KeyBuilder = dyn Fn(&str, &Value) -> String + Send + Sync;

/// Namespaced, tiered cache over a [`KeyValueStore`]
pub struct TieredCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    eviction_batch_percent: u32,
    policies: HashMap<DataClass, DataClassPolicy>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("prefix", &self.prefix)
            .field("eviction_batch_percent", &self.eviction_batch_percent)
            .field("policies", &self.policies)
            .finish()
    }
}

impl TieredCache {
    /// Create a cache with built-in policies and the `cache` prefix
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            prefix: "cache".to_string(),
            eviction_batch_percent: 10,
            policies: DataClass::all()
                .iter()
                .map(|class| (*class, class.default_policy()))
                .collect(),
        }
    }

    /// Create a cache from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration names an unknown data class.
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Result<Self> {
        let mut cache = Self::new(store)
            .with_prefix(config.key_prefix.clone())
            .with_eviction_batch_percent(config.eviction_batch_percent);

        for (name, overrides) in &config.data_classes {
            let class = DataClass::from_str(name)
                .map_err(|e| ToolHubError::Configuration(e.to_string()))?;
            let mut policy = cache.policy(class);
            if let Some(level) = overrides.default_level {
                policy.default_level = level;
            }
            if let Some(max_size) = overrides.max_size {
                policy.max_size = max_size;
            }
            cache = cache.with_policy(class, policy);
        }

        Ok(cache)
    }

    /// Set the key namespace prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the eviction batch as a percentage of a class's max size
    pub fn with_eviction_batch_percent(mut self, percent: u32) -> Self {
        self.eviction_batch_percent = percent.clamp(1, 100);
        self
    }

    /// Override the policy of one data class
    pub fn with_policy(mut self, class: DataClass, policy: DataClassPolicy) -> Self {
        self.policies.insert(class, policy);
        self
    }

    /// Effective policy for a data class
    pub fn policy(&self, class: DataClass) -> DataClassPolicy {
        self.policies
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_policy())
    }

    /// Physical store key for a logical key
    pub fn physical_key(&self, key: &str, class: DataClass) -> String {
        format!("{}:{}:{}", self.prefix, class.as_str(), key)
    }

    fn index_key(&self, class: DataClass, level: CacheLevel) -> String {
        format!("{}_index:{}:{}", self.prefix, class.as_str(), level.as_str())
    }

    /// Entries removed per eviction pass: `ceil(max_size * percent / 100)`
    pub fn eviction_batch_size(&self, max_size: usize) -> usize {
        let percent = self.eviction_batch_percent as usize;
        (max_size * percent).div_ceil(100).max(1)
    }

    /// Read a value; backend and decode failures count as a miss
    pub async fn get(&self, key: &str, class: DataClass) -> Option<Value> {
        let physical = self.physical_key(key, class);
        let raw = match self.store.get(&physical).await {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(key = %physical, %error, "Cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key = %physical, %error, "Cached value is not valid JSON; treating as miss");
                None
            }
        }
    }

    /// Read and decode a typed value
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str, class: DataClass) -> Option<T> {
        let value = self.get(key, class).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!(key, data_class = %class, %error, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Write a value
    ///
    /// The level defaults to the data class policy; the TTL defaults to the
    /// level's TTL unless a non-zero override is given. Returns `false` when
    /// the value could not be written.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        class: DataClass,
        level: Option<CacheLevel>,
        ttl_override: Option<Duration>,
    ) -> bool {
        let policy = self.policy(class);
        let level = level.unwrap_or(policy.default_level);
        let ttl = ttl_override
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or_else(|| level.ttl());
        let physical = self.physical_key(key, class);

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(key = %physical, %error, "Value is not serializable; skipping cache write");
                return false;
            }
        };

        if let Err(error) = self.store.set_with_ttl(&physical, &encoded, ttl).await {
            tracing::warn!(key = %physical, %error, "Cache write failed");
            return false;
        }

        let index = self.index_key(class, level);
        if let Err(error) = self.store.add_to_set(&index, &physical).await {
            tracing::warn!(key = %physical, index = %index, %error, "Failed to index cache entry");
            return true;
        }

        tracing::trace!(key = %physical, %level, ttl_secs = ttl.as_secs(), "Cached value");
        self.evict_if_needed(class, level, policy.max_size).await;
        true
    }

    /// Trim an index that grew past `max_size`
    ///
    /// Removes the entries closest to natural expiry first. Members whose
    /// value is already gone sort as zero remaining TTL.
    async fn evict_if_needed(&self, class: DataClass, level: CacheLevel, max_size: usize) {
        let index = self.index_key(class, level);
        let cardinality = match self.store.set_cardinality(&index).await {
            Ok(n) => n,
            Err(error) => {
                tracing::warn!(index = %index, %error, "Failed to read index size; skipping eviction");
                return;
            }
        };
        if cardinality <= max_size {
            return;
        }

        let members = match self.store.set_members(&index).await {
            Ok(members) => members,
            Err(error) => {
                tracing::warn!(index = %index, %error, "Failed to list index; skipping eviction");
                return;
            }
        };

        let mut ranked = Vec::with_capacity(members.len());
        for member in members {
            let remaining = match self.store.ttl_remaining(&member).await {
                Ok(remaining) => remaining.unwrap_or(Duration::ZERO),
                Err(error) => {
                    tracing::warn!(key = %member, %error, "Failed to read TTL during eviction");
                    Duration::ZERO
                }
            };
            ranked.push((remaining, member));
        }
        ranked.sort();

        let batch = self.eviction_batch_size(max_size);
        let mut evicted = 0usize;
        for (_, member) in ranked.into_iter().take(batch) {
            if let Err(error) = self.store.delete(&member).await {
                tracing::warn!(key = %member, %error, "Failed to evict cache entry");
                continue;
            }
            if let Err(error) = self.store.remove_from_set(&index, &member).await {
                tracing::warn!(key = %member, %error, "Failed to unindex evicted entry");
            }
            evicted += 1;
        }

        tracing::debug!(
            data_class = %class,
            %level,
            cardinality,
            max_size,
            evicted,
            "Evicted cache entries closest to expiry"
        );
    }

    /// Delete a value and drop it from every level index of its class
    ///
    /// Returns `true` when a stored value was removed.
    pub async fn delete(&self, key: &str, class: DataClass) -> bool {
        let physical = self.physical_key(key, class);
        let removed = match self.store.delete(&physical).await {
            Ok(removed) => removed,
            Err(error) => {
                tracing::warn!(key = %physical, %error, "Cache delete failed");
                return false;
            }
        };

        for level in CacheLevel::all() {
            let index = self.index_key(class, *level);
            if let Err(error) = self.store.remove_from_set(&index, &physical).await {
                tracing::warn!(key = %physical, index = %index, %error, "Failed to unindex deleted entry");
            }
        }
        removed
    }

    /// Check whether a value is cached
    pub async fn exists(&self, key: &str, class: DataClass) -> bool {
        let physical = self.physical_key(key, class);
        match self.store.exists(&physical).await {
            Ok(exists) => exists,
            Err(error) => {
                tracing::warn!(key = %physical, %error, "Cache exists check failed");
                false
            }
        }
    }

    /// Remove every entry of a data class, returning the number of values deleted
    pub async fn clear_data_class(&self, class: DataClass) -> usize {
        let pattern = format!("{}:{}:*", self.prefix, class.as_str());
        let keys = match self.store.keys_matching(&pattern).await {
            Ok(keys) => keys,
            Err(error) => {
                tracing::warn!(%pattern, %error, "Failed to list keys for clearing");
                Vec::new()
            }
        };

        let mut deleted = 0usize;
        for key in &keys {
            match self.store.delete(key).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(error) => tracing::warn!(key = %key, %error, "Failed to delete during clear"),
            }
        }

        for level in CacheLevel::all() {
            let index = self.index_key(class, *level);
            if let Err(error) = self.store.delete(&index).await {
                tracing::warn!(index = %index, %error, "Failed to drop index during clear");
            }
        }

        tracing::info!(data_class = %class, deleted, "Cleared data class");
        deleted
    }

    /// Index cardinalities per level and per (data class, level)
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for class in DataClass::all() {
            let per_level = stats.by_data_class.entry(*class).or_default();
            for level in CacheLevel::all() {
                let index = self.index_key(*class, *level);
                let count = match self.store.set_cardinality(&index).await {
                    Ok(count) => count,
                    Err(error) => {
                        tracing::warn!(index = %index, %error, "Failed to read index size");
                        0
                    }
                };
                per_level.insert(*level, count);
                *stats.by_level.entry(*level).or_default() += count;
                stats.total_entries += count;
            }
        }
        stats
    }

    /// Start a get-or-compute call against `class`
    pub fn cached(&self, class: DataClass) -> CachedCall<'_> {
        CachedCall {
            cache: self,
            class,
            level: None,
            ttl: None,
            key_builder: None,
        }
    }
}

/// Get-or-compute wrapper produced by [`TieredCache::cached`]
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use toolhub_core::cache::{CacheLevel, DataClass, MemoryStore, TieredCache};
/// # async fn demo() -> Result<(), std::io::Error> {
/// # let cache = TieredCache::new(Arc::new(MemoryStore::new()));
/// let forecast: String = cache
///     .cached(DataClass::ExternalApi)
///     .level(CacheLevel::L3)
///     .get_or_compute("weather::forecast", &("Oslo", 3), || async {
///         Ok::<_, std::io::Error>("sunny".to_string())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CachedCall<'a> {
    cache: &'a TieredCache,
    class: DataClass,
    level: Option<CacheLevel>,
    ttl: Option<Duration>,
    key_builder: Option<Box<KeyBuilder>>,
}

impl<'a> CachedCall<'a> {
    /// Write at a specific level
    pub fn level(mut self, level: CacheLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Override the TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Replace the default hashed key
    pub fn key_with<F>(mut self, builder: F) -> Self
    where
        F: Fn(&str, &Value) -> String + Send + Sync + 'static,
    {
        self.key_builder = Some(Box::new(builder));
        self
    }

    /// Key used for `identity` and `args`
    pub fn key_for(&self, identity: &str, args: &Value) -> String {
        match &self.key_builder {
            Some(builder) => builder(identity, args),
            None => hashed_key(identity, args),
        }
    }

    /// Return the cached value or run `compute` and cache its `Ok` output
    pub async fn get_or_compute<A, T, E, F, Fut>(
        self,
        identity: &str,
        args: &A,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let args = match serde_json::to_value(args) {
            Ok(args) => args,
            Err(error) => {
                tracing::warn!(identity, %error, "Arguments are not serializable; bypassing cache");
                return compute().await;
            }
        };
        let key = self.key_for(identity, &args);

        if let Some(hit) = self.cache.get_as::<T>(&key, self.class).await {
            tracing::trace!(identity, key = %key, "Cached call hit");
            return Ok(hit);
        }

        let value = compute().await?;
        self.cache
            .set(&key, &value, self.class, self.level, self.ttl)
            .await;
        tracing::trace!(identity, args = %canonical_json(&args), "Cached call stored");
        Ok(value)
    }
}
