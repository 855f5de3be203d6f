//! Service discovery hooks
//!
//! The registry announces each registered tool through a [`ServiceRegistrar`]
//! and withdraws it on unregistration. Failures never block registration.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors raised by discovery backends
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Backend could not be reached
    #[error("Discovery backend unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the request
    #[error("Discovery request rejected: {0}")]
    Rejected(String),
}

/// External service-discovery client
#[async_trait]
pub trait ServiceRegistrar: Send + Sync {
    /// Announce a tool
    async fn register_service(&self, name: &str) -> Result<(), DiscoveryError>;

    /// Withdraw a tool
    async fn deregister_service(&self, name: &str) -> Result<(), DiscoveryError>;
}

/// Registrar that keeps the announced names in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistrar {
    services: Arc<RwLock<BTreeSet<String>>>,
}

impl InMemoryRegistrar {
    /// Create an empty registrar
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently announced names, sorted
    pub async fn services(&self) -> Vec<String> {
        self.services.read().await.iter().cloned().collect()
    }

    /// Whether `name` is announced
    pub async fn contains(&self, name: &str) -> bool {
        self.services.read().await.contains(name)
    }
}

#[async_trait]
impl ServiceRegistrar for InMemoryRegistrar {
    async fn register_service(&self, name: &str) -> Result<(), DiscoveryError> {
        self.services.write().await.insert(name.to_string());
        Ok(())
    }

    async fn deregister_service(&self, name: &str) -> Result<(), DiscoveryError> {
        self.services.write().await.remove(name);
        Ok(())
    }
}
