//! Error types for toolhub operations

/// Result type for toolhub operations
pub type Result<T> = std::result::Result<T, ToolHubError>;

/// Errors surfaced while assembling the registry and its collaborators.
///
/// Tool calls never return these: execution failures are folded into
/// [`ToolCallResult`](crate::tools::ToolCallResult) envelopes instead.
#[derive(Debug, thiserror::Error)]
pub enum ToolHubError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key-value store error
    #[error("Store error: {0}")]
    Store(#[from] crate::cache::StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ToolHubError {
    fn from(s: String) -> Self {
        ToolHubError::Other(s)
    }
}

impl From<&str> for ToolHubError {
    fn from(s: &str) -> Self {
        ToolHubError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolHubError {
    fn from(err: anyhow::Error) -> Self {
        ToolHubError::Other(err.to_string())
    }
}
