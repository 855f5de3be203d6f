//! Deterministic cache key construction
//!
//! Keys must not depend on the order in which a caller happened to build a
//! parameter object, so objects are serialized with their keys sorted at
//! every nesting level.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize `value` as compact JSON with object keys sorted recursively
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Cache key for a tool call: `name:canonical_json(parameters)`
pub fn tool_cache_key(tool_name: &str, parameters: &Value) -> String {
    format!("{}:{}", tool_name, canonical_json(parameters))
}

/// Hex SHA-256 of `identity:canonical_json(args)`
///
/// Used as the default key for [`CachedCall`](super::CachedCall) so that
/// arbitrarily large argument lists map to fixed-size keys.
pub fn hashed_key(identity: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(b":");
    hasher.update(canonical_json(args).as_bytes());
    format!("{:x}", hasher.finalize())
}
