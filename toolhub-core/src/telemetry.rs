//! Tool usage telemetry
//!
//! Every call that reaches the cache or a handler produces one
//! [`ToolUsageRecord`]. Sinks are best-effort: the registry logs and drops
//! any [`TelemetryError`] instead of failing the call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors raised by telemetry sinks
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Sink could not accept the record
    #[error("Telemetry sink rejected record: {0}")]
    Rejected(String),

    /// Sink backend is unreachable
    #[error("Telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageOutcome {
    /// Handler ran and succeeded
    Success,
    /// Served from the tool result cache
    SuccessCached,
    /// Handler failed, panicked, or timed out
    Failure,
}

impl UsageOutcome {
    /// Get the string name of this outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageOutcome::Success => "success",
            UsageOutcome::SuccessCached => "success_cached",
            UsageOutcome::Failure => "failure",
        }
    }
}

/// One tool invocation as seen by telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageRecord {
    /// Unique record id
    pub id: Uuid,
    /// Tool that was called
    pub tool_name: String,
    /// Calling agent
    pub agent_id: String,
    /// Operation label, e.g. `execute`
    pub operation: String,
    /// Parameters as received
    pub parameters: Value,
    /// Wall-clock time spent, in milliseconds
    pub duration_ms: u64,
    /// Outcome of the call
    pub outcome: UsageOutcome,
    /// Truncated rendering of the result or error
    pub result_summary: String,
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
}

impl ToolUsageRecord {
    /// Create a record stamped with the current time
    pub fn new(
        tool_name: impl Into<String>,
        agent_id: impl Into<String>,
        parameters: Value,
        outcome: UsageOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            agent_id: agent_id.into(),
            operation: "execute".to_string(),
            parameters,
            duration_ms: 0,
            outcome,
            result_summary: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the operation label
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Set the elapsed time
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Set the result summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.result_summary = summary.into();
        self
    }
}

/// Truncate `text` to at most `max_chars` characters
pub fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Destination for usage records
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Record one tool invocation
    async fn record_tool_usage(&self, record: ToolUsageRecord) -> Result<(), TelemetryError>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn record_tool_usage(&self, _record: ToolUsageRecord) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Sink that emits each record as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

#[async_trait]
impl TelemetrySink for TracingTelemetry {
    async fn record_tool_usage(&self, record: ToolUsageRecord) -> Result<(), TelemetryError> {
        tracing::info!(
            target: "toolhub::telemetry",
            record_id = %record.id,
            tool = %record.tool_name,
            agent_id = %record.agent_id,
            operation = %record.operation,
            outcome = record.outcome.as_str(),
            duration_ms = record.duration_ms,
            summary = %record.result_summary,
            "Tool usage"
        );
        Ok(())
    }
}

/// Bounded in-memory sink, oldest records dropped first
#[derive(Debug, Clone)]
pub struct InMemoryTelemetry {
    records: Arc<RwLock<VecDeque<ToolUsageRecord>>>,
    capacity: usize,
}

impl InMemoryTelemetry {
    /// Create a sink holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// All retained records, oldest first
    pub async fn records(&self) -> Vec<ToolUsageRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    /// Retained records for one tool, oldest first
    pub async fn records_for_tool(&self, tool_name: &str) -> Vec<ToolUsageRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.tool_name == tool_name)
            .cloned()
            .collect()
    }

    /// Number of retained records with the given outcome
    pub async fn count_outcome(&self, outcome: UsageOutcome) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    /// Number of retained records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no records are retained
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop every record
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

impl Default for InMemoryTelemetry {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl TelemetrySink for InMemoryTelemetry {
    async fn record_tool_usage(&self, record: ToolUsageRecord) -> Result<(), TelemetryError> {
        let mut records = self.records.write().await;
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }
}
