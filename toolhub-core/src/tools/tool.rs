//! Tool metadata, handlers and availability
//!
//! A [`Tool`] pairs descriptive [`ToolMetadata`] with a [`ToolHandler`].
//! Handlers come in two flavours: async handlers run on the calling task,
//! synchronous ones are pushed onto the registry's bounded blocking pool so
//! they never stall other calls.

use super::capability::{Capability, CapabilitySet};
use super::result::ValidationError;
use super::validation::ParameterValidator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Pricing tier of the upstream API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    /// No per-call cost
    #[default]
    Free,
    /// Metered, standard pricing
    Standard,
    /// Metered, premium pricing
    Premium,
    /// Contracted enterprise pricing
    Enterprise,
}

/// Example tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExample {
    /// Example name/description
    pub name: String,

    /// Input parameters
    pub input: Value,

    /// Expected output
    pub output: Value,
}

impl ToolExample {
    /// Create a new example
    pub fn new(name: impl Into<String>, input: Value, output: Value) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }
}

/// Tool metadata for discovery and dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Tool version
    pub version: String,

    /// Capabilities used for discovery
    pub capabilities: CapabilitySet,

    /// JSON Schema for input parameters
    pub parameters_schema: Value,

    /// JSON Schema describing the output (informational)
    pub response_schema: Value,

    /// Whether the tool needs an API key to run
    pub requires_api_key: bool,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Upstream rate limit in requests per minute
    pub rate_limit_per_minute: Option<u32>,

    /// Pricing tier of the upstream API
    pub pricing_tier: PricingTier,

    /// Tags for categorization
    pub tags: Vec<String>,

    /// Example payloads
    pub examples: Vec<ToolExample>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            capabilities: CapabilitySet::new(),
            parameters_schema: serde_json::json!({ "type": "object" }),
            response_schema: serde_json::json!({ "type": "object" }),
            requires_api_key: false,
            api_key_env: None,
            rate_limit_per_minute: None,
            pricing_tier: PricingTier::Free,
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// Set version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a capability
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.add(capability);
        self
    }

    /// Add several capabilities
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        for cap in capabilities {
            self.capabilities.add(cap);
        }
        self
    }

    /// Set the parameter schema
    pub fn with_parameters_schema(mut self, schema: Value) -> Self {
        self.parameters_schema = schema;
        self
    }

    /// Set the response schema
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = schema;
        self
    }

    /// Require an API key read from the given environment variable
    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.requires_api_key = true;
        self.api_key_env = Some(env_var.into());
        self
    }

    /// Set the upstream rate limit
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = Some(per_minute);
        self
    }

    /// Set pricing tier
    pub fn with_pricing_tier(mut self, tier: PricingTier) -> Self {
        self.pricing_tier = tier;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add an example
    pub fn with_example(mut self, example: ToolExample) -> Self {
        self.examples.push(example);
        self
    }
}

/// Source of credentials consulted when a tool is constructed
pub trait CredentialSource {
    /// Return the credential stored under `name`, if any
    fn credential(&self, name: &str) -> Option<String>;
}

/// Reads credentials from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credential(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn credential(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Asynchronous tool handler
#[async_trait]
pub trait AsyncToolHandler: Send + Sync {
    /// Run the tool for `agent_id`
    async fn call(&self, parameters: Value, agent_id: &str) -> anyhow::Result<Value>;
}

/// Adapts an async closure into an [`AsyncToolHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> AsyncToolHandler for FnHandler<F>
where
    F: Fn(Value, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, parameters: Value, agent_id: &str) -> anyhow::Result<Value> {
        (self.0)(parameters, agent_id.to_string()).await
    }
}

/// Signature of a synchronous handler
pub type SyncHandlerFn = dyn Fn(Value, &str) -> anyhow::Result<Value> + Send + Sync;

/// Tool handler variant
#[derive(Clone)]
pub enum ToolHandler {
    /// Blocking handler, executed on the bounded blocking pool
    Sync(Arc<SyncHandlerFn>),
    /// Async handler, awaited on the calling task
    Async(Arc<dyn AsyncToolHandler>),
}

impl ToolHandler {
    /// Wrap a blocking closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Value, &str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ToolHandler::Sync(Arc::new(f))
    }

    /// Wrap an async closure
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        ToolHandler::Async(Arc::new(FnHandler(f)))
    }

    /// Wrap an [`AsyncToolHandler`] implementation
    pub fn from_handler(handler: impl AsyncToolHandler + 'static) -> Self {
        ToolHandler::Async(Arc::new(handler))
    }

    /// Whether the handler runs on the blocking pool
    pub fn is_blocking(&self) -> bool {
        matches!(self, ToolHandler::Sync(_))
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Sync(_) => f.write_str("ToolHandler::Sync"),
            ToolHandler::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

/// A registered tool: metadata, handler and availability
#[derive(Debug)]
pub struct Tool {
    metadata: ToolMetadata,
    handler: ToolHandler,
    available: bool,
    validator: Option<ParameterValidator>,
}

impl Tool {
    /// Create a tool, resolving its credential from the process environment
    pub fn new(metadata: ToolMetadata, handler: ToolHandler) -> Self {
        Self::with_credentials(metadata, handler, &EnvCredentials)
    }

    /// Create a tool, resolving its credential from `credentials`
    pub fn with_credentials(
        metadata: ToolMetadata,
        handler: ToolHandler,
        credentials: &dyn CredentialSource,
    ) -> Self {
        let credential_present = metadata
            .api_key_env
            .as_deref()
            .and_then(|name| credentials.credential(name))
            .is_some_and(|value| !value.trim().is_empty());
        let available = !metadata.requires_api_key || credential_present;

        if !available {
            tracing::warn!(
                tool = %metadata.name,
                credential = metadata.api_key_env.as_deref().unwrap_or("<unset>"),
                "Tool requires an API key that is not configured; marking unavailable"
            );
        }

        let validator = match ParameterValidator::compile(&metadata.parameters_schema) {
            Ok(validator) => Some(validator),
            Err(error) => {
                tracing::warn!(
                    tool = %metadata.name,
                    %error,
                    "Parameter schema does not compile; parameters will not be validated"
                );
                None
            }
        };

        Self {
            metadata,
            handler,
            available,
            validator,
        }
    }

    /// Get tool metadata
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Get tool name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Get the handler
    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }

    /// Whether the tool can be executed
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Check parameters against the declared schema
    pub fn validate(&self, parameters: &Value) -> Result<(), Vec<ValidationError>> {
        match &self.validator {
            Some(validator) => validator.validate(parameters),
            None => Ok(()),
        }
    }

    /// Metadata view with credential details removed
    pub fn config_view(&self) -> ToolConfigView {
        let metadata = &self.metadata;
        ToolConfigView {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            version: metadata.version.clone(),
            capabilities: metadata.capabilities.clone(),
            parameters_schema: metadata.parameters_schema.clone(),
            response_schema: metadata.response_schema.clone(),
            requires_api_key: metadata.requires_api_key,
            available: self.available,
            rate_limit_per_minute: metadata.rate_limit_per_minute,
            pricing_tier: metadata.pricing_tier,
            tags: metadata.tags.clone(),
            examples: metadata.examples.clone(),
        }
    }
}

/// Tool description safe to hand to callers
///
/// Omits the credential variable name along with any credential value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfigView {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Tool version
    pub version: String,
    /// Capabilities
    pub capabilities: CapabilitySet,
    /// JSON Schema for input parameters
    pub parameters_schema: Value,
    /// JSON Schema describing the output
    pub response_schema: Value,
    /// Whether the tool needs an API key
    pub requires_api_key: bool,
    /// Whether the tool can currently be executed
    pub available: bool,
    /// Upstream rate limit
    pub rate_limit_per_minute: Option<u32>,
    /// Pricing tier
    pub pricing_tier: PricingTier,
    /// Tags
    pub tags: Vec<String>,
    /// Example payloads
    pub examples: Vec<ToolExample>,
}
