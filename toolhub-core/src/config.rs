//! Configuration types for toolhub

use crate::cache::{CacheLevel, DataClass};
use crate::error::{Result, ToolHubError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ToolHubConfig {
    /// Registry and execution settings
    pub registry: RegistryConfig,

    /// Tiered cache settings
    pub cache: CacheConfig,

    /// Key-value store backend
    pub store: StoreConfig,

    /// Usage telemetry settings
    pub telemetry: TelemetryConfig,
}

/// Registry and execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum in-flight calls during a parallel bulk execution
    pub max_concurrency: usize,

    /// Maximum synchronous handlers running at once
    pub blocking_pool_size: usize,

    /// Validate parameters against each tool's schema before dispatch
    pub validate_parameters: bool,

    /// Upper bound on a single handler invocation
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub handler_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            blocking_pool_size: 8,
            validate_parameters: true,
            handler_timeout: None,
        }
    }
}

/// Tiered cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prefix for every physical key
    pub key_prefix: String,

    /// Share of `max_size` evicted once an index overflows, in percent
    pub eviction_batch_percent: u32,

    /// Per data class overrides, keyed by data class name
    pub data_classes: BTreeMap<String, DataClassOverride>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "cache".to_string(),
            eviction_batch_percent: 10,
            data_classes: BTreeMap::new(),
        }
    }
}

/// Override of a data class's built-in policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DataClassOverride {
    /// Level used when a write names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_level: Option<CacheLevel>,

    /// Maximum entries per level index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

/// Key-value store backend
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store
    #[default]
    Memory,

    /// Redis server (requires the `redis-store` feature)
    Redis {
        /// Connection URL, e.g. `redis://localhost:6379/0`
        url: String,
    },
}

/// Usage telemetry settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Where usage records go
    pub sink: TelemetrySinkKind,

    /// Maximum characters kept in a record's result summary
    pub summary_max_chars: usize,

    /// Records retained by the in-memory sink
    pub memory_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sink: TelemetrySinkKind::Tracing,
            summary_max_chars: 200,
            memory_capacity: 1000,
        }
    }
}

/// Telemetry sink selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TelemetrySinkKind {
    /// Structured `tracing` events
    #[default]
    Tracing,
    /// Bounded in-memory buffer
    Memory,
    /// Discard records
    None,
}

impl ToolHubConfig {
    /// Layered configuration source.
    ///
    /// Merges in this order, later layers winning:
    /// 1. Built-in defaults
    /// 2. `toolhub.toml` in the working directory
    /// 3. The file named by `TOOLHUB_CONFIG_PATH`, if set
    /// 4. `TOOLHUB_*` environment variables, `__` separating nested keys
    ///    (e.g. `TOOLHUB_REGISTRY__MAX_CONCURRENCY=4`)
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ToolHubConfig::default()))
            .merge(Toml::file("toolhub.toml"));

        if let Ok(path) = std::env::var("TOOLHUB_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("TOOLHUB_").split("__").ignore(&["config_path"]))
    }

    /// Load configuration from file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed or the result fails
    /// validation.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Load configuration from a specific file path, on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(ToolHubConfig::default()))
            .merge(Toml::file(path.as_ref()));

        if !path.as_ref().exists() {
            return Err(ToolHubError::Configuration(format!(
                "Configuration file not found: {}",
                path.as_ref().display()
            )));
        }

        Self::from_figment(figment)
    }

    /// Extract and validate configuration from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: ToolHubConfig = figment.extract().map_err(|e| {
            ToolHubError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ToolHubError::Configuration(msg));

        if self.registry.max_concurrency == 0 {
            return invalid("registry.max_concurrency must be at least 1".to_string());
        }
        if self.registry.blocking_pool_size == 0 {
            return invalid("registry.blocking_pool_size must be at least 1".to_string());
        }
        if self.registry.handler_timeout.is_some_and(|t| t.is_zero()) {
            return invalid("registry.handler_timeout must be greater than zero".to_string());
        }

        if !(1..=100).contains(&self.cache.eviction_batch_percent) {
            return invalid(format!(
                "cache.eviction_batch_percent must be within 1..=100, got {}",
                self.cache.eviction_batch_percent
            ));
        }
        if self.cache.key_prefix.trim().is_empty() {
            return invalid("cache.key_prefix must not be empty".to_string());
        }
        for (name, overrides) in &self.cache.data_classes {
            DataClass::from_str(name).map_err(|e| {
                ToolHubError::Configuration(format!("cache.data_classes: {}", e))
            })?;
            if overrides.max_size == Some(0) {
                return invalid(format!(
                    "cache.data_classes.{}.max_size must be at least 1",
                    name
                ));
            }
        }

        if let StoreConfig::Redis { url } = &self.store {
            let scheme_ok = ["redis://", "rediss://", "redis+unix://", "unix://"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !scheme_ok {
                return invalid(format!("store.url is not a Redis URL: '{}'", url));
            }
        }

        if self.telemetry.memory_capacity == 0 {
            return invalid("telemetry.memory_capacity must be at least 1".to_string());
        }

        Ok(())
    }
}
