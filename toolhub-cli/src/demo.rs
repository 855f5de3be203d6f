//! Local demonstration tools registered by the CLI

use anyhow::Context;
use serde_json::{Value, json};
use toolhub_core::tools::{
    Capability, PricingTier, Tool, ToolExample, ToolHandler, ToolMetadata, ToolRegistry,
};

fn echo() -> Tool {
    let metadata = ToolMetadata::new("echo", "Return the parameters unchanged")
        .with_capability(Capability::Generation)
        .with_tag("debug")
        .with_example(ToolExample::new(
            "roundtrip",
            json!({"x": 1}),
            json!({"x": 1}),
        ));
    Tool::new(metadata, ToolHandler::from_fn(|params, _agent| Ok(params)))
}

fn word_count() -> Tool {
    let metadata = ToolMetadata::new("word_count", "Count words and characters in text")
        .with_capabilities([Capability::DataAnalysis, Capability::Retrieval])
        .with_parameters_schema(json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        }))
        .with_response_schema(json!({
            "type": "object",
            "properties": {
                "words": { "type": "integer" },
                "chars": { "type": "integer" }
            }
        }))
        .with_pricing_tier(PricingTier::Free);

    Tool::new(
        metadata,
        ToolHandler::from_fn(|params, _agent| {
            let text = params
                .get("text")
                .and_then(Value::as_str)
                .context("missing 'text'")?;
            Ok(json!({
                "words": text.split_whitespace().count(),
                "chars": text.chars().count(),
            }))
        }),
    )
}

fn utc_now() -> Tool {
    let metadata = ToolMetadata::new("utc_now", "Current UTC time as RFC 3339")
        .with_capability(Capability::Planning)
        .with_tag("time");
    Tool::new(
        metadata,
        ToolHandler::from_async(|_params, agent_id| async move {
            Ok(json!({
                "now": chrono::Utc::now().to_rfc3339(),
                "agent_id": agent_id,
            }))
        }),
    )
}

fn web_search() -> Tool {
    let metadata = ToolMetadata::new("web_search", "Search the web (requires an API key)")
        .with_capabilities([Capability::Search, Capability::WebBrowsing])
        .with_api_key_env("TOOLHUB_SEARCH_API_KEY")
        .with_rate_limit(60)
        .with_pricing_tier(PricingTier::Standard)
        .with_parameters_schema(json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }));

    Tool::new(
        metadata,
        ToolHandler::from_async(|params, _agent| async move {
            let query = params
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            // No upstream is wired in the demo build
            Ok(json!({"query": query, "results": []}))
        }),
    )
}

/// Register every demonstration tool
pub async fn register_all(registry: &mut ToolRegistry) {
    for tool in [echo(), word_count(), utc_now(), web_search()] {
        registry.register(tool).await;
    }
}
