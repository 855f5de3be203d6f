//! Uniform result envelope for tool calls
//!
//! Every call through the registry produces a [`ToolCallResult`], whether the
//! tool ran, was served from cache, or was rejected before dispatch. Callers
//! never see a Rust error for a single failed call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result envelope returned for every tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Handler output (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Whether the call succeeded
    pub success: bool,

    /// Name of the tool that was requested
    pub tool_name: String,

    /// Whether the envelope was served from the tiered cache
    #[serde(default)]
    pub from_cache: bool,

    /// Human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolCallResult {
    /// Successful call carrying the handler output
    pub fn success(tool_name: impl Into<String>, value: Value) -> Self {
        Self {
            result: Some(value),
            success: true,
            tool_name: tool_name.into(),
            from_cache: false,
            error: None,
            error_kind: None,
        }
    }

    /// Failed call
    pub fn failure(
        tool_name: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            result: None,
            success: false,
            tool_name: tool_name.into(),
            from_cache: false,
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    /// The requested tool is not registered
    pub fn not_found(tool_name: &str) -> Self {
        Self::failure(
            tool_name,
            ToolErrorKind::NotFound,
            format!("Tool '{}' not found", tool_name),
        )
    }

    /// The requested tool is registered but its credential is missing
    pub fn unavailable(tool_name: &str) -> Self {
        Self::failure(
            tool_name,
            ToolErrorKind::Unavailable,
            format!("Tool '{}' is not available (missing API key)", tool_name),
        )
    }

    /// Parameters were rejected by the tool's schema
    pub fn validation(tool_name: &str, errors: &[ValidationError]) -> Self {
        let details = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self::failure(
            tool_name,
            ToolErrorKind::Validation,
            format!("Validation failed: {}", details),
        )
    }

    /// Mark the envelope as served from cache
    pub fn into_cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Check if this result represents success
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Get the handler output if successful
    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref()
    }
}

/// Failure taxonomy for call envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No tool registered under the requested name
    NotFound,

    /// Tool requires a credential that is not configured
    Unavailable,

    /// Parameters did not match the declared schema
    Validation,

    /// Handler returned an error, panicked, or reported `success: false`
    HandlerFailure,

    /// Handler exceeded the configured timeout
    Timeout,

    /// The batch orchestration itself failed
    Internal,
}

impl ToolErrorKind {
    /// Get the string name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::Unavailable => "unavailable",
            ToolErrorKind::Validation => "validation",
            ToolErrorKind::HandlerFailure => "handler_failure",
            ToolErrorKind::Timeout => "timeout",
            ToolErrorKind::Internal => "internal",
        }
    }

    /// Whether the registry rejected the call before reaching the handler
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            ToolErrorKind::NotFound | ToolErrorKind::Unavailable | ToolErrorKind::Validation
        )
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation error for a specific parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON pointer to the offending value ("" for the root)
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}
