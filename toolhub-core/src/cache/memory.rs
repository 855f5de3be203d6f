//! In-process key-value store
//!
//! Expiry is evaluated lazily against [`tokio::time::Instant`], so tests can
//! move time forward with `tokio::time::advance` under a paused runtime.

use super::store::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`KeyValueStore`] with TTL support
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired value, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut values = self.values.write().await;
        let before = values.len();
        values.retain(|_, stored| stored.is_live(now));
        before - values.len()
    }

    /// Number of live values
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.values
            .read()
            .await
            .values()
            .filter(|stored| stored.is_live(now))
            .count()
    }

    /// Whether the store holds no live values
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Translate a glob (`*`, `?`) into an anchored regex
fn glob_to_regex(pattern: &str) -> StoreResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');

    Regex::new(&expr).map_err(|e| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        match values.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(_) => {
                values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::Backend(format!(
                "refusing to write '{}' with a zero TTL",
                key
            )));
        }
        let stored = StoredValue {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.values.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let removed_value = self
            .values
            .write()
            .await
            .remove(key)
            .is_some_and(|stored| stored.is_live(now));
        let removed_set = self.sets.write().await.remove(key).is_some();
        Ok(removed_value || removed_set)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let values = self.values.read().await;
        let mut keys: Vec<String> = values
            .iter()
            .filter(|(key, stored)| stored.is_live(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> StoreResult<()> {
        self.sets
            .write()
            .await
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let mut sets = self.sets.write().await;
        let Some(members) = sets.get_mut(set_key) else {
            return Ok(false);
        };
        let removed = members.remove(member);
        if members.is_empty() {
            sets.remove(set_key);
        }
        Ok(removed)
    }

    async fn set_cardinality(&self, set_key: &str) -> StoreResult<usize> {
        Ok(self
            .sets
            .read()
            .await
            .get(set_key)
            .map_or(0, |members| members.len()))
    }

    async fn set_members(&self, set_key: &str) -> StoreResult<Vec<String>> {
        let mut members: Vec<String> = self
            .sets
            .read()
            .await
            .get(set_key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.expires_at - now))
    }
}
