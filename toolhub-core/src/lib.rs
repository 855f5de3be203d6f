//! # Toolhub - tool registry with tiered result caching
//!
//! Toolhub keeps an in-process catalog of agent tools and runs them behind a
//! uniform envelope:
//! - Capability-indexed registration with credential-based availability
//! - JSON Schema validation of call parameters
//! - Deterministic cache keys and a tiered, size-bounded cache
//! - Single and bulk execution with per-call failure isolation
//! - Usage telemetry and service-discovery hooks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolhub_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ToolHubConfig::load()?;
//!     let mut registry = registry_from_config(&config).await?;
//!
//!     registry
//!         .register(Tool::new(
//!             ToolMetadata::new("echo", "Echo the parameters").with_capability(Capability::Generation),
//!             ToolHandler::from_fn(|params, _agent| Ok(params)),
//!         ))
//!         .await;
//!
//!     let service = ToolHubService::new(Arc::new(registry));
//!     let result = service
//!         .execute(ExecuteRequest::new("echo", serde_json::json!({"x": 1})))
//!         .await;
//!     assert!(result.success);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `redis-store`: Redis-backed [`cache::KeyValueStore`]

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod service;
pub mod telemetry;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{
        CacheLevel, CacheStats, DataClass, KeyValueStore, MemoryStore, TieredCache,
    };
    pub use crate::config::{
        CacheConfig, RegistryConfig, StoreConfig, TelemetryConfig, ToolHubConfig,
    };
    pub use crate::discovery::{InMemoryRegistrar, ServiceRegistrar};
    pub use crate::error::{Result, ToolHubError};
    pub use crate::service::{
        BulkExecuteRequest, ExecuteRequest, ToolHubService, registry_from_config,
    };
    pub use crate::telemetry::{
        InMemoryTelemetry, TelemetrySink, ToolUsageRecord, TracingTelemetry, UsageOutcome,
    };
    pub use crate::tools::{
        AsyncToolHandler, Capability, CapabilitySet, Tool, ToolCallResult, ToolErrorKind,
        ToolExecution, ToolHandler, ToolMetadata, ToolRegistry,
    };
}
