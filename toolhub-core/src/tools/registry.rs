//! Tool registry: catalog, capability index and execution
//!
//! The `ToolRegistry` provides:
//! - Registration by name (last write wins) with a capability index
//! - Availability gating for tools that need a credential
//! - Parameter validation against each tool's schema
//! - Read-through caching of successful results in the tiered cache
//! - Single and bulk execution with per-call failure isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use toolhub_core::cache::{MemoryStore, TieredCache};
//! use toolhub_core::config::RegistryConfig;
//! use toolhub_core::tools::{Capability, Tool, ToolHandler, ToolMetadata, ToolRegistry};
//!
//! # async fn demo() {
//! let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
//! let mut registry = ToolRegistry::new(cache, RegistryConfig::default());
//!
//! let metadata = ToolMetadata::new("echo", "Echo the input").with_capability(Capability::Generation);
//! registry
//!     .register(Tool::new(metadata, ToolHandler::from_fn(|params, _agent| Ok(params))))
//!     .await;
//!
//! let result = registry.execute("echo", json!({"x": 1}), "agent-1", true, None).await;
//! assert!(result.success);
//! # }
//! ```

use super::capability::Capability;
use super::result::{ToolCallResult, ToolErrorKind, ValidationError};
use super::tool::{Tool, ToolConfigView, ToolHandler, ToolMetadata};
use crate::cache::{DataClass, TieredCache, tool_cache_key};
use crate::config::RegistryConfig;
use crate::discovery::ServiceRegistrar;
use crate::telemetry::{NoopTelemetry, TelemetrySink, ToolUsageRecord, UsageOutcome, summarize};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::Instant;

/// One call inside a bulk execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Tool to call
    pub tool_name: String,

    /// Call parameters
    #[serde(default)]
    pub parameters: Value,

    /// Per-call cache toggle; falls back to the batch setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,

    /// Per-call TTL override for the cached result
    #[serde(
        default,
        with = "crate::tools::ttl",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_ttl: Option<Duration>,
}

impl ToolExecution {
    /// Create an execution with batch-level cache settings
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            use_cache: None,
            cache_ttl: None,
        }
    }

    /// Override the batch cache toggle for this call
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Override the cached result TTL for this call
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

/// Handler-side failure before it is folded into an envelope
struct HandlerFailure {
    kind: ToolErrorKind,
    message: String,
}

impl HandlerFailure {
    fn handler(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::HandlerFailure,
            message: message.into(),
        }
    }

    fn timeout(limit: Duration) -> Self {
        Self {
            kind: ToolErrorKind::Timeout,
            message: format!("Tool timed out after {:?}", limit),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("Tool panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("Tool panicked: {}", msg)
    } else {
        "Tool panicked".to_string()
    }
}

/// Registry of executable tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<Tool>>,
    order: Vec<String>,
    capability_index: BTreeMap<Capability, Vec<String>>,
    cache: Arc<TieredCache>,
    telemetry: Arc<dyn TelemetrySink>,
    registrar: Option<Arc<dyn ServiceRegistrar>>,
    blocking_gate: Arc<Semaphore>,
    bulk_gate: Arc<Semaphore>,
    summary_max_chars: usize,
    config: RegistryConfig,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.order)
            .field("config", &self.config)
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry backed by `cache`
    pub fn new(cache: Arc<TieredCache>, config: RegistryConfig) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            capability_index: BTreeMap::new(),
            cache,
            telemetry: Arc::new(NoopTelemetry),
            registrar: None,
            blocking_gate: Arc::new(Semaphore::new(config.blocking_pool_size.max(1))),
            bulk_gate: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            summary_max_chars: 200,
            config,
        }
    }

    /// Send usage records to `sink`
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Announce registrations through `registrar`
    pub fn with_registrar(mut self, registrar: Arc<dyn ServiceRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Truncate telemetry result summaries to `max_chars`
    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    /// The cache used for tool results
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Registry settings
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Stop accepting work
    ///
    /// Calls already running finish normally. Later sync handler calls fail
    /// with an `internal` envelope, as does every entry of a later batch.
    pub fn shutdown(&self) {
        self.blocking_gate.close();
        self.bulk_gate.close();
        tracing::info!(tools = self.tools.len(), "Tool registry shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.bulk_gate.is_closed()
    }

    /// Register a tool, replacing any tool with the same name
    ///
    /// Discovery failures are logged and do not affect the registration.
    pub async fn register(&mut self, tool: Tool) -> bool {
        let name = tool.name().to_string();

        if self.tools.remove(&name).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
            self.unindex(&name);
        } else {
            self.order.push(name.clone());
        }

        for capability in tool.metadata().capabilities.iter() {
            let names = self.capability_index.entry(*capability).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
        }

        tracing::info!(
            tool = %name,
            available = tool.is_available(),
            capabilities = tool.metadata().capabilities.len(),
            "Registered tool"
        );
        self.tools.insert(name.clone(), Arc::new(tool));

        if let Some(registrar) = &self.registrar {
            if let Err(error) = registrar.register_service(&name).await {
                tracing::warn!(tool = %name, %error, "Service registration failed");
            }
        }
        true
    }

    /// Remove a tool; returns `false` when no tool had that name
    pub async fn unregister(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_none() {
            return false;
        }
        self.order.retain(|n| n != name);
        self.unindex(name);
        tracing::info!(tool = %name, "Unregistered tool");

        if let Some(registrar) = &self.registrar {
            if let Err(error) = registrar.deregister_service(name).await {
                tracing::warn!(tool = %name, %error, "Service deregistration failed");
            }
        }
        true
    }

    fn unindex(&mut self, name: &str) {
        for names in self.capability_index.values_mut() {
            names.retain(|n| n != name);
        }
        self.capability_index.retain(|_, names| !names.is_empty());
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools declaring `capability`, in registration order
    pub fn by_capability(&self, capability: Capability) -> Vec<Arc<Tool>> {
        self.capability_index
            .get(&capability)
            .map(|names| names.iter().filter_map(|n| self.get(n)).collect())
            .unwrap_or_default()
    }

    fn registered(&self, available_only: bool) -> impl Iterator<Item = &Arc<Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(move |tool| !available_only || tool.is_available())
    }

    /// Tool names in registration order
    pub fn list(&self, available_only: bool) -> Vec<String> {
        self.registered(available_only)
            .map(|tool| tool.name().to_string())
            .collect()
    }

    /// Tool metadata in registration order
    pub fn list_with_metadata(&self, available_only: bool) -> Vec<ToolMetadata> {
        self.registered(available_only)
            .map(|tool| tool.metadata().clone())
            .collect()
    }

    /// Capability -> tool names, including unavailable tools
    pub fn capabilities_map(&self) -> BTreeMap<Capability, Vec<String>> {
        self.capability_index.clone()
    }

    /// Capability -> names of tools that can currently run
    ///
    /// Capabilities without any available tool are omitted.
    pub fn list_available(&self) -> BTreeMap<Capability, Vec<String>> {
        self.capability_index
            .iter()
            .filter_map(|(capability, names)| {
                let available: Vec<String> = names
                    .iter()
                    .filter(|n| self.tools.get(*n).is_some_and(|t| t.is_available()))
                    .cloned()
                    .collect();
                (!available.is_empty()).then_some((*capability, available))
            })
            .collect()
    }

    /// Redacted configuration of one tool
    pub fn tool_config(&self, name: &str) -> Option<ToolConfigView> {
        self.tools.get(name).map(|tool| tool.config_view())
    }

    /// Execute a tool and return its result envelope
    ///
    /// Never fails: unknown tools, missing credentials, invalid parameters
    /// and handler failures all come back as unsuccessful envelopes. Only
    /// successful results are cached, under [`DataClass::ToolResult`].
    pub async fn execute(
        &self,
        tool_name: &str,
        parameters: Value,
        agent_id: &str,
        use_cache: bool,
        cache_ttl: Option<Duration>,
    ) -> ToolCallResult {
        let started = Instant::now();

        let Some(tool) = self.get(tool_name) else {
            tracing::warn!(tool = %tool_name, agent_id, "Tool not found");
            return ToolCallResult::not_found(tool_name);
        };

        if !tool.is_available() {
            tracing::warn!(tool = %tool_name, agent_id, "Tool is unavailable");
            return ToolCallResult::unavailable(tool_name);
        }

        let parameters = if parameters.is_null() {
            json!({})
        } else {
            parameters
        };

        if self.config.validate_parameters {
            if let Err(errors) = Self::validate_parameters(&tool, &parameters) {
                tracing::debug!(tool = %tool_name, agent_id, errors = errors.len(), "Parameters rejected");
                return ToolCallResult::validation(tool_name, &errors);
            }
        }

        let cache_key = tool_cache_key(tool_name, &parameters);

        if use_cache {
            if let Some(hit) = self
                .cache
                .get_as::<ToolCallResult>(&cache_key, DataClass::ToolResult)
                .await
                .filter(|hit| hit.success)
            {
                tracing::debug!(tool = %tool_name, agent_id, "Serving tool result from cache");
                let summary = hit.result.as_ref().map(Value::to_string).unwrap_or_default();
                self.record_usage(tool_name, agent_id, parameters, UsageOutcome::SuccessCached, started, &summary)
                    .await;
                return hit.into_cached();
            }
        }

        match self.invoke(&tool, parameters.clone(), agent_id).await {
            Ok(value) => {
                let result = ToolCallResult::success(tool_name, value);
                if use_cache {
                    self.cache
                        .set(&cache_key, &result, DataClass::ToolResult, None, cache_ttl)
                        .await;
                }
                let summary = result.result.as_ref().map(Value::to_string).unwrap_or_default();
                tracing::debug!(
                    tool = %tool_name,
                    agent_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                self.record_usage(tool_name, agent_id, parameters, UsageOutcome::Success, started, &summary)
                    .await;
                result
            }
            Err(failure) => {
                tracing::warn!(
                    tool = %tool_name,
                    agent_id,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Tool execution failed"
                );
                self.record_usage(
                    tool_name,
                    agent_id,
                    parameters,
                    UsageOutcome::Failure,
                    started,
                    &failure.message,
                )
                .await;
                ToolCallResult::failure(tool_name, failure.kind, failure.message)
            }
        }
    }

    fn validate_parameters(tool: &Tool, parameters: &Value) -> Result<(), Vec<ValidationError>> {
        if !parameters.is_object() {
            return Err(vec![ValidationError::new(
                "",
                "parameters must be a JSON object",
            )]);
        }
        tool.validate(parameters)
    }

    async fn invoke(
        &self,
        tool: &Tool,
        parameters: Value,
        agent_id: &str,
    ) -> Result<Value, HandlerFailure> {
        let output = match tool.handler() {
            ToolHandler::Sync(handler) => {
                let handler = Arc::clone(handler);
                let gate = Arc::clone(&self.blocking_gate);
                let agent_id = agent_id.to_string();

                // Waiting for a pool slot counts against the handler timeout
                let call = async move {
                    let permit = gate.acquire_owned().await.map_err(|_| HandlerFailure {
                        kind: ToolErrorKind::Internal,
                        message: "Blocking pool is closed".to_string(),
                    })?;
                    let joined = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        handler(parameters, &agent_id)
                    })
                    .await;
                    Ok::<_, HandlerFailure>(joined)
                };

                match self.bounded(call).await?? {
                    Ok(result) => result,
                    Err(join_error) if join_error.is_panic() => {
                        return Err(HandlerFailure::handler(panic_message(
                            join_error.into_panic().as_ref(),
                        )));
                    }
                    Err(join_error) => {
                        return Err(HandlerFailure::handler(join_error.to_string()));
                    }
                }
            }
            ToolHandler::Async(handler) => {
                let call = AssertUnwindSafe(handler.call(parameters, agent_id)).catch_unwind();
                match self.bounded(call).await? {
                    Ok(result) => result,
                    Err(payload) => {
                        return Err(HandlerFailure::handler(panic_message(payload.as_ref())));
                    }
                }
            }
        };

        let value = output.map_err(|e| HandlerFailure::handler(format!("{:#}", e)))?;

        // Handlers may report a logical failure instead of erroring
        if value.get("success") == Some(&Value::Bool(false)) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Tool reported failure")
                .to_string();
            return Err(HandlerFailure::handler(message));
        }

        Ok(value)
    }

    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, HandlerFailure> {
        match self.config.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| HandlerFailure::timeout(limit)),
            None => Ok(fut.await),
        }
    }

    async fn record_usage(
        &self,
        tool_name: &str,
        agent_id: &str,
        parameters: Value,
        outcome: UsageOutcome,
        started: Instant,
        summary: &str,
    ) {
        let record = ToolUsageRecord::new(tool_name, agent_id, parameters, outcome)
            .with_duration_ms(started.elapsed().as_millis() as u64)
            .with_summary(summarize(summary, self.summary_max_chars));

        if let Err(error) = self.telemetry.record_tool_usage(record).await {
            tracing::warn!(tool = %tool_name, %error, "Failed to record tool usage");
        }
    }

    /// Execute a batch of calls, preserving input order in the output
    ///
    /// At most `max_concurrency` batch calls run at once across the registry.
    /// One failing call never affects its siblings. If the batch itself
    /// cannot run, every entry comes back as an `internal` envelope.
    pub async fn bulk_execute(
        &self,
        executions: Vec<ToolExecution>,
        agent_id: &str,
        use_cache: bool,
        parallel: bool,
    ) -> Vec<ToolCallResult> {
        tracing::debug!(count = executions.len(), agent_id, parallel, "Bulk execution");

        let outcomes: Result<Vec<_>, AcquireError> = if parallel {
            futures::future::join_all(
                executions
                    .iter()
                    .map(|execution| self.execute_gated(execution, agent_id, use_cache)),
            )
            .await
            .into_iter()
            .collect()
        } else {
            self.execute_sequential(&executions, agent_id, use_cache).await
        };

        match outcomes {
            Ok(results) => results,
            Err(error) => {
                tracing::error!(%error, agent_id, "Bulk execution failed");
                executions
                    .iter()
                    .map(|execution| {
                        ToolCallResult::failure(
                            &execution.tool_name,
                            ToolErrorKind::Internal,
                            format!("Bulk execution failed: {}", error),
                        )
                    })
                    .collect()
            }
        }
    }

    async fn execute_sequential(
        &self,
        executions: &[ToolExecution],
        agent_id: &str,
        use_cache: bool,
    ) -> Result<Vec<ToolCallResult>, AcquireError> {
        let mut results = Vec::with_capacity(executions.len());
        for execution in executions {
            results.push(self.execute_gated(execution, agent_id, use_cache).await?);
        }
        Ok(results)
    }

    async fn execute_gated(
        &self,
        execution: &ToolExecution,
        agent_id: &str,
        use_cache: bool,
    ) -> Result<ToolCallResult, AcquireError> {
        let _permit = self.bulk_gate.acquire().await?;
        Ok(self.execute_one(execution, agent_id, use_cache).await)
    }

    async fn execute_one(
        &self,
        execution: &ToolExecution,
        agent_id: &str,
        use_cache: bool,
    ) -> ToolCallResult {
        self.execute(
            &execution.tool_name,
            execution.parameters.clone(),
            agent_id,
            execution.use_cache.unwrap_or(use_cache),
            execution.cache_ttl,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheLevel, MemoryStore};
    use crate::discovery::{DiscoveryError, InMemoryRegistrar};
    use crate::telemetry::InMemoryTelemetry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn new_registry() -> ToolRegistry {
        let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
        ToolRegistry::new(cache, RegistryConfig::default())
    }

    fn echo_tool() -> Tool {
        let metadata = ToolMetadata::new("echo", "Echo parameters back")
            .with_capability(Capability::Generation);
        Tool::new(metadata, ToolHandler::from_fn(|params, _agent| Ok(params)))
    }

    fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> Tool {
        let metadata = ToolMetadata::new(name, "Counts invocations")
            .with_capability(Capability::Retrieval);
        Tool::new(
            metadata,
            ToolHandler::from_async(move |params, _agent| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"echo": params}))
                }
            }),
        )
    }

    fn keyed_tool(name: &str, capabilities: &[Capability], credentials: &HashMap<String, String>) -> Tool {
        let metadata = ToolMetadata::new(name, "Needs a key")
            .with_capabilities(capabilities.iter().copied())
            .with_api_key_env("TOOLHUB_TEST_KEY");
        Tool::with_credentials(
            metadata,
            ToolHandler::from_fn(|_params, _agent| Ok(json!({"ok": true}))),
            credentials,
        )
    }

    #[tokio::test]
    async fn test_echo_end_to_end() {
        let mut registry = new_registry();
        assert!(registry.register(echo_tool()).await);

        let result = registry
            .execute("echo", json!({"x": 1}), "agent-1", true, None)
            .await;
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"result": {"x": 1}, "success": true, "tool_name": "echo", "from_cache": false})
        );

        let second = registry
            .execute("echo", json!({"x": 1}), "agent-1", true, None)
            .await;
        assert!(second.success);
        assert!(second.from_cache);
        assert_eq!(second.result, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_cache_short_circuits_repeat_calls() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_tool("lookup", counter.clone())).await;

        for _ in 0..5 {
            let result = registry
                .execute("lookup", json!({"q": "rust"}), "agent-1", true, None)
                .await;
            assert!(result.success);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Bypassing the cache always reaches the handler
        registry
            .execute("lookup", json!({"q": "rust"}), "agent-1", false, None)
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_key_ignores_parameter_order() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_tool("lookup", counter.clone())).await;

        let mut forward = serde_json::Map::new();
        forward.insert("a".into(), json!(1));
        forward.insert("b".into(), json!(2));
        let mut reverse = serde_json::Map::new();
        reverse.insert("b".into(), json!(2));
        reverse.insert("a".into(), json!(1));

        registry
            .execute("lookup", Value::Object(forward), "agent-1", true, None)
            .await;
        let second = registry
            .execute("lookup", Value::Object(reverse), "agent-2", true, None)
            .await;
        assert!(second.from_cache);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl_override_expires_result() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_tool("lookup", counter.clone())).await;

        let ttl = Some(Duration::from_secs(10));
        registry.execute("lookup", json!({}), "a", true, ttl).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        let result = registry.execute("lookup", json!({}), "a", true, ttl).await;

        assert!(!result.from_cache);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = new_registry();
        let result = registry.execute("nope", json!({}), "a", true, None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool 'nope' not found"));
        assert_eq!(result.error_kind, Some(ToolErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_availability_gating() {
        let mut registry = new_registry();
        let missing = HashMap::new();
        let mut present = HashMap::new();
        present.insert("TOOLHUB_TEST_KEY".to_string(), "secret".to_string());

        registry
            .register(keyed_tool("locked", &[Capability::Search], &missing))
            .await;
        registry
            .register(keyed_tool("open", &[Capability::Search, Capability::Code], &present))
            .await;

        let result = registry.execute("locked", json!({}), "a", true, None).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::Unavailable));
        assert!(result.error.unwrap().starts_with("Tool 'locked' is not available"));

        assert!(registry.execute("open", json!({}), "a", true, None).await.success);

        assert_eq!(registry.list(false), vec!["locked", "open"]);
        assert_eq!(registry.list(true), vec!["open"]);

        let available = registry.list_available();
        assert_eq!(available[&Capability::Search], vec!["open"]);
        assert_eq!(available[&Capability::Code], vec!["open"]);

        let all = registry.capabilities_map();
        assert_eq!(all[&Capability::Search], vec!["locked", "open"]);
    }

    #[tokio::test]
    async fn test_replacement_updates_capability_index() {
        let mut registry = new_registry();
        registry.register(echo_tool()).await;
        assert_eq!(registry.by_capability(Capability::Generation).len(), 1);

        let replacement = Tool::new(
            ToolMetadata::new("echo", "Echo v2").with_capability(Capability::Reasoning),
            ToolHandler::from_fn(|params, _agent| Ok(params)),
        );
        assert!(registry.register(replacement).await);

        assert_eq!(registry.len(), 1);
        assert!(registry.by_capability(Capability::Generation).is_empty());
        assert_eq!(registry.by_capability(Capability::Reasoning).len(), 1);
        assert!(!registry.capabilities_map().contains_key(&Capability::Generation));
        assert_eq!(registry.get("echo").unwrap().metadata().description, "Echo v2");
    }

    #[tokio::test]
    async fn test_unregister() {
        let registrar = Arc::new(InMemoryRegistrar::new());
        let mut registry = new_registry().with_registrar(registrar.clone());
        registry.register(echo_tool()).await;
        assert!(registrar.contains("echo").await);

        assert!(registry.unregister("echo").await);
        assert!(!registry.unregister("echo").await);
        assert!(registry.is_empty());
        assert!(registry.by_capability(Capability::Generation).is_empty());
        assert!(!registrar.contains("echo").await);
    }

    struct DownRegistrar;

    #[async_trait]
    impl ServiceRegistrar for DownRegistrar {
        async fn register_service(&self, _name: &str) -> Result<(), DiscoveryError> {
            Err(DiscoveryError::Unavailable("connection refused".to_string()))
        }

        async fn deregister_service(&self, _name: &str) -> Result<(), DiscoveryError> {
            Err(DiscoveryError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_registrar_failure_does_not_block_registration() {
        let mut registry = new_registry().with_registrar(Arc::new(DownRegistrar));
        assert!(registry.register(echo_tool()).await);
        assert!(registry.contains("echo"));
        assert!(registry.unregister("echo").await);
    }

    #[tokio::test]
    async fn test_parameter_validation() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let metadata = ToolMetadata::new("search", "Search").with_parameters_schema(json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }));
        registry
            .register(Tool::new(
                metadata,
                ToolHandler::from_fn(move |_params, _agent| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!([]))
                }),
            ))
            .await;

        let result = registry.execute("search", json!({"query": 7}), "a", true, None).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Validation));
        assert!(result.error.unwrap().starts_with("Validation failed"));

        let result = registry.execute("search", json!("rust"), "a", true, None).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Validation));

        // Null becomes an empty object, which misses the required field
        let result = registry.execute("search", Value::Null, "a", true, None).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Validation));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(registry.execute("search", json!({"query": "rust"}), "a", true, None).await.success);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
        let config = RegistryConfig {
            validate_parameters: false,
            ..RegistryConfig::default()
        };
        let mut registry = ToolRegistry::new(cache, config);
        registry.register(echo_tool()).await;

        let result = registry.execute("echo", json!("raw"), "a", false, None).await;
        assert!(result.success);
        assert_eq!(result.result, Some(json!("raw")));
    }

    #[tokio::test]
    async fn test_handler_failures_are_isolated_and_not_cached() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        registry
            .register(Tool::new(
                ToolMetadata::new("flaky", "Always fails"),
                ToolHandler::from_fn(move |_params, _agent| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("upstream returned 503")
                }),
            ))
            .await;

        for _ in 0..2 {
            let result = registry.execute("flaky", json!({}), "a", true, None).await;
            assert!(!result.success);
            assert!(!result.from_cache);
            assert_eq!(result.error_kind, Some(ToolErrorKind::HandlerFailure));
            assert_eq!(result.error.as_deref(), Some("upstream returned 503"));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(
            registry.cache().stats().await.by_level[&CacheLevel::L2],
            0
        );
    }

    #[tokio::test]
    async fn test_logical_failure_output() {
        let mut registry = new_registry();
        registry
            .register(Tool::new(
                ToolMetadata::new("soft_fail", "Reports failure in-band"),
                ToolHandler::from_fn(|_params, _agent| {
                    Ok(json!({"success": false, "error": "quota exceeded"}))
                }),
            ))
            .await;

        let result = registry.execute("soft_fail", json!({}), "a", true, None).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::HandlerFailure));
        assert_eq!(result.error.as_deref(), Some("quota exceeded"));
        assert_eq!(registry.cache().stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_panics_are_captured() {
        let mut registry = new_registry();
        registry
            .register(Tool::new(
                ToolMetadata::new("sync_panic", "Panics"),
                ToolHandler::from_fn(|_params, _agent| panic!("sync boom")),
            ))
            .await;
        registry
            .register(Tool::new(
                ToolMetadata::new("async_panic", "Panics"),
                ToolHandler::from_async(|_params, _agent| async move {
                    if true {
                        panic!("async boom");
                    }
                    Ok(json!(null))
                }),
            ))
            .await;

        let result = registry.execute("sync_panic", json!({}), "a", true, None).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::HandlerFailure));
        assert!(result.error.unwrap().contains("sync boom"));

        let result = registry.execute("async_panic", json!({}), "a", true, None).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::HandlerFailure));
        assert!(result.error.unwrap().contains("async boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout() {
        let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
        let config = RegistryConfig {
            handler_timeout: Some(Duration::from_millis(50)),
            ..RegistryConfig::default()
        };
        let mut registry = ToolRegistry::new(cache, config);
        registry
            .register(Tool::new(
                ToolMetadata::new("slow", "Sleeps"),
                ToolHandler::from_async(|_params, _agent| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!("late"))
                }),
            ))
            .await;

        let result = registry.execute("slow", json!({}), "a", true, None).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_hung_sync_tool_does_not_stall_other_sync_tools() {
        let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
        let config = RegistryConfig {
            blocking_pool_size: 1,
            handler_timeout: Some(Duration::from_millis(100)),
            ..RegistryConfig::default()
        };
        let mut registry = ToolRegistry::new(cache, config);
        registry
            .register(Tool::new(
                ToolMetadata::new("hang", "Blocks its thread"),
                ToolHandler::from_fn(|_params, _agent| {
                    std::thread::sleep(Duration::from_secs(1));
                    Ok(json!("late"))
                }),
            ))
            .await;
        registry
            .register(Tool::new(
                ToolMetadata::new("quick", "Returns at once"),
                ToolHandler::from_fn(|_params, _agent| Ok(json!("done"))),
            ))
            .await;

        let hung = registry.execute("hang", json!({}), "a", false, None).await;
        assert_eq!(hung.error_kind, Some(ToolErrorKind::Timeout));

        // The only pool slot is still held by the hung thread
        let started = std::time::Instant::now();
        let result = registry.execute("quick", json!({}), "a", false, None).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(result.error_kind, Some(ToolErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_shutdown_fails_batches_uniformly() {
        let mut registry = new_registry();
        registry.register(echo_tool()).await;
        registry.shutdown();
        assert!(registry.is_shut_down());

        for parallel in [true, false] {
            let results = registry
                .bulk_execute(
                    vec![
                        ToolExecution::new("echo", json!({"i": 0})),
                        ToolExecution::new("missing", json!({})),
                        ToolExecution::new("echo", json!({"i": 2})),
                    ],
                    "agent-1",
                    true,
                    parallel,
                )
                .await;

            assert_eq!(results.len(), 3);
            assert!(results.iter().all(|r| !r.success));
            assert!(results.iter().all(|r| r.error_kind == Some(ToolErrorKind::Internal)));
            let names: Vec<&str> = results.iter().map(|r| r.tool_name.as_str()).collect();
            assert_eq!(names, vec!["echo", "missing", "echo"]);
        }

        // Single sync calls are refused as well
        let single = registry.execute("echo", json!({}), "agent-1", false, None).await;
        assert_eq!(single.error_kind, Some(ToolErrorKind::Internal));
    }

    #[tokio::test]
    async fn test_telemetry_outcomes() {
        let sink = Arc::new(InMemoryTelemetry::new(100));
        let mut registry = new_registry()
            .with_telemetry(sink.clone())
            .with_summary_max_chars(5);
        registry.register(echo_tool()).await;
        registry
            .register(Tool::new(
                ToolMetadata::new("broken", "Fails"),
                ToolHandler::from_fn(|_params, _agent| anyhow::bail!("nope")),
            ))
            .await;

        registry.execute("echo", json!({"text": "hello world"}), "agent-7", true, None).await;
        registry.execute("echo", json!({"text": "hello world"}), "agent-7", true, None).await;
        registry.execute("broken", json!({}), "agent-7", true, None).await;
        registry.execute("missing", json!({}), "agent-7", true, None).await;

        let records = sink.records().await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].outcome, UsageOutcome::Success);
        assert_eq!(records[0].agent_id, "agent-7");
        assert_eq!(records[0].result_summary.chars().count(), 5);
        assert_eq!(records[1].outcome, UsageOutcome::SuccessCached);
        assert_eq!(records[2].outcome, UsageOutcome::Failure);
        assert_eq!(records[2].tool_name, "broken");
    }

    #[tokio::test]
    async fn test_bulk_execute_isolates_failures() {
        let mut registry = new_registry();
        registry.register(echo_tool()).await;
        registry
            .register(Tool::new(
                ToolMetadata::new("broken", "Fails"),
                ToolHandler::from_fn(|_params, _agent| anyhow::bail!("nope")),
            ))
            .await;

        for parallel in [true, false] {
            let results = registry
                .bulk_execute(
                    vec![
                        ToolExecution::new("echo", json!({"i": 0})),
                        ToolExecution::new("broken", json!({})),
                        ToolExecution::new("missing", json!({})),
                        ToolExecution::new("echo", json!({"i": 3})),
                    ],
                    "agent-1",
                    false,
                    parallel,
                )
                .await;

            assert_eq!(results.len(), 4);
            assert_eq!(results[0].result, Some(json!({"i": 0})));
            assert_eq!(results[1].error_kind, Some(ToolErrorKind::HandlerFailure));
            assert_eq!(results[2].error_kind, Some(ToolErrorKind::NotFound));
            assert_eq!(results[3].result, Some(json!({"i": 3})));
            let names: Vec<&str> = results.iter().map(|r| r.tool_name.as_str()).collect();
            assert_eq!(names, vec!["echo", "broken", "missing", "echo"]);
        }
    }

    #[tokio::test]
    async fn test_bulk_execute_respects_concurrency_limit() {
        let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
        let config = RegistryConfig {
            max_concurrency: 2,
            ..RegistryConfig::default()
        };
        let mut registry = ToolRegistry::new(cache, config);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (current, highest) = (in_flight.clone(), peak.clone());
        registry
            .register(Tool::new(
                ToolMetadata::new("slow", "Tracks concurrency"),
                ToolHandler::from_async(move |params, _agent| {
                    let current = current.clone();
                    let highest = highest.clone();
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        highest.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(params)
                    }
                }),
            ))
            .await;

        let executions = (0..6)
            .map(|i| ToolExecution::new("slow", json!({"i": i})))
            .collect();
        let results = registry.bulk_execute(executions, "a", false, true).await;

        assert!(results.iter().all(|r| r.success));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bulk_per_call_cache_overrides() {
        let mut registry = new_registry();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_tool("lookup", counter.clone())).await;

        let batch = || {
            vec![
                ToolExecution::new("lookup", json!({"k": 1})),
                ToolExecution::new("lookup", json!({"k": 2})).with_use_cache(false),
            ]
        };
        registry.bulk_execute(batch(), "a", true, false).await;
        let results = registry.bulk_execute(batch(), "a", true, false).await;

        assert!(results[0].from_cache);
        assert!(!results[1].from_cache);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_tool_config_is_redacted() {
        let mut registry = new_registry();
        let mut present = HashMap::new();
        present.insert("TOOLHUB_TEST_KEY".to_string(), "s3cr3t".to_string());
        registry
            .register(keyed_tool("paid", &[Capability::Search], &present))
            .await;

        let view = registry.tool_config("paid").unwrap();
        let rendered = serde_json::to_string(&view).unwrap();
        assert!(view.requires_api_key);
        assert!(view.available);
        assert!(!rendered.contains("TOOLHUB_TEST_KEY"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(registry.tool_config("missing").is_none());
    }
}
