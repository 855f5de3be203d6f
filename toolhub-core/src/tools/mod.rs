//! Tool catalog and execution
//!
//! Key features:
//! - Capability-indexed registration with last-write-wins replacement
//! - Credential-based availability gating
//! - JSON Schema parameter validation
//! - Cached execution with a uniform result envelope
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolhub_core::cache::{MemoryStore, TieredCache};
//! use toolhub_core::config::RegistryConfig;
//! use toolhub_core::tools::{Capability, Tool, ToolHandler, ToolMetadata, ToolRegistry};
//!
//! # async fn demo() {
//! let cache = Arc::new(TieredCache::new(Arc::new(MemoryStore::new())));
//! let mut registry = ToolRegistry::new(cache, RegistryConfig::default());
//! registry
//!     .register(Tool::new(
//!         ToolMetadata::new("upper", "Uppercase text").with_capability(Capability::Generation),
//!         ToolHandler::from_fn(|params, _agent| {
//!             let text = params["text"].as_str().unwrap_or_default();
//!             Ok(serde_json::json!(text.to_uppercase()))
//!         }),
//!     ))
//!     .await;
//! # }
//! ```

mod capability;
mod registry;
mod result;
mod tool;
pub(crate) mod ttl;
mod validation;

pub use capability::{Capability, CapabilitySet, UnknownCapability};
pub use registry::{ToolExecution, ToolRegistry};
pub use result::{ToolCallResult, ToolErrorKind, ValidationError};
pub use tool::{
    AsyncToolHandler, CredentialSource, EnvCredentials, FnHandler, PricingTier, SyncHandlerFn,
    Tool, ToolConfigView, ToolExample, ToolHandler, ToolMetadata,
};
pub use validation::ParameterValidator;
