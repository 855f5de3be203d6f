//! Service facade over a populated [`ToolRegistry`]
//!
//! Request and response types are plain serde structs so a transport layer
//! can expose them directly.

use crate::cache::{CacheStats, KeyValueStore, MemoryStore, TieredCache};
use crate::config::{StoreConfig, TelemetryConfig, TelemetrySinkKind, ToolHubConfig};
use crate::error::Result;
use crate::telemetry::{InMemoryTelemetry, NoopTelemetry, TelemetrySink, TracingTelemetry};
use crate::tools::{Capability, ToolCallResult, ToolConfigView, ToolExecution, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn default_agent_id() -> String {
    "anonymous".to_string()
}

fn default_true() -> bool {
    true
}

/// Single tool call request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Tool to call
    pub tool_name: String,

    /// Call parameters
    #[serde(default)]
    pub parameters: Value,

    /// Calling agent
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Consult and populate the tool result cache
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// TTL override for the cached result, in seconds or e.g. `"90s"`
    #[serde(
        default,
        with = "crate::tools::ttl",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_ttl: Option<Duration>,
}

impl ExecuteRequest {
    /// Create a cached request from the anonymous agent
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            agent_id: default_agent_id(),
            use_cache: true,
            cache_ttl: None,
        }
    }

    /// Set the calling agent
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }
}

/// Batch of tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkExecuteRequest {
    /// Calls, answered in the same order
    pub requests: Vec<ToolExecution>,

    /// Calling agent
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Cache toggle for calls that do not set their own
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Run calls concurrently
    #[serde(default = "default_true")]
    pub parallel: bool,
}

/// Service surface consumed by transports and the CLI
#[derive(Debug, Clone)]
pub struct ToolHubService {
    registry: Arc<ToolRegistry>,
}

impl ToolHubService {
    /// Wrap a populated registry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one tool call
    pub async fn execute(&self, request: ExecuteRequest) -> ToolCallResult {
        self.registry
            .execute(
                &request.tool_name,
                request.parameters,
                &request.agent_id,
                request.use_cache,
                request.cache_ttl,
            )
            .await
    }

    /// Execute a batch of tool calls
    pub async fn bulk_execute(&self, request: BulkExecuteRequest) -> Vec<ToolCallResult> {
        self.registry
            .bulk_execute(
                request.requests,
                &request.agent_id,
                request.use_cache,
                request.parallel,
            )
            .await
    }

    /// Capability -> names of tools that can run now
    pub fn list_available(&self) -> BTreeMap<Capability, Vec<String>> {
        self.registry.list_available()
    }

    /// Redacted configuration of one tool
    pub fn get_tool_config(&self, name: &str) -> Option<ToolConfigView> {
        self.registry.tool_config(name)
    }

    /// Cache index sizes
    pub async fn cache_stats(&self) -> CacheStats {
        self.registry.cache().stats().await
    }
}

/// Open the configured key-value store
///
/// # Errors
///
/// Returns an error if Redis is selected but cannot be reached, or the crate
/// was built without the `redis-store` feature.
pub async fn store_from_config(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "redis-store")]
        StoreConfig::Redis { url } => Ok(Arc::new(crate::cache::RedisStore::connect(url).await?)),
        #[cfg(not(feature = "redis-store"))]
        StoreConfig::Redis { .. } => Err(crate::error::ToolHubError::Configuration(
            "store.type = \"redis\" requires the redis-store feature".to_string(),
        )),
    }
}

/// Build the configured telemetry sink
pub fn telemetry_from_config(config: &TelemetryConfig) -> Arc<dyn TelemetrySink> {
    match config.sink {
        TelemetrySinkKind::Tracing => Arc::new(TracingTelemetry),
        TelemetrySinkKind::Memory => Arc::new(InMemoryTelemetry::new(config.memory_capacity)),
        TelemetrySinkKind::None => Arc::new(NoopTelemetry),
    }
}

/// Assemble an empty registry with store, cache and telemetry from `config`
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the store cannot be
/// opened.
pub async fn registry_from_config(config: &ToolHubConfig) -> Result<ToolRegistry> {
    config.validate()?;

    let store = store_from_config(&config.store).await?;
    let cache = Arc::new(TieredCache::from_config(store, &config.cache)?);
    tracing::info!(
        prefix = %config.cache.key_prefix,
        telemetry = ?config.telemetry.sink,
        "Assembled tool registry"
    );

    Ok(ToolRegistry::new(cache, config.registry.clone())
        .with_telemetry(telemetry_from_config(&config.telemetry))
        .with_summary_max_chars(config.telemetry.summary_max_chars))
}
