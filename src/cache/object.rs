//! Object Cache Tier - Optional Shared Cache
//!
//! Process-external cache shared by all workers (memcached, Redis, or
//! similar behind the trait). Deployments without one simply construct the
//! manager with `None`; availability is fixed at construction and never
//! re-probed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;

/// Shared object-cache backend
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Get a value by derived key
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Set a value with the given TTL
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Delete a key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`, returning the count removed
    async fn purge_prefix(&self, prefix: &str) -> Result<u64>;

    /// Number of live entries
    fn entry_count(&self) -> usize;
}

struct ObjectRow {
    value: Value,
    expires_at: Instant,
}

/// In-memory object cache for tests and single-node deployments
#[derive(Default)]
pub struct InMemoryObjectCache {
    entries: DashMap<String, ObjectRow>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read operations performed
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Write operations performed
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectCache for InMemoryObjectCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let expired = match self.entries.get(key) {
            Some(row) if Instant::now() >= row.expires_at => true,
            Some(row) => return Ok(Some(row.value.clone())),
            None => return Ok(None),
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            ObjectRow {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn purge_prefix(&self, prefix: &str) -> Result<u64> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get() {
        let cache = InMemoryObjectCache::new();
        cache
            .set("k", &json!([1, 2, 3]), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(json!([1, 2, 3])));
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = InMemoryObjectCache::new();
        cache.set("k", &json!(1), Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let cache = InMemoryObjectCache::new();
        cache.set("k", &json!(1), Duration::from_secs(60)).await.unwrap();

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_prefix() {
        let cache = InMemoryObjectCache::new();
        cache.set("netdash_a_1", &json!(1), Duration::from_secs(60)).await.unwrap();
        cache.set("netdash_a_2", &json!(2), Duration::from_secs(60)).await.unwrap();
        cache.set("other_b_1", &json!(3), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.purge_prefix("netdash_a_").await.unwrap(), 2);
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_op_counters() {
        let cache = InMemoryObjectCache::new();
        cache.set("k", &json!(1), Duration::from_secs(60)).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("miss").await.unwrap();

        assert_eq!(cache.writes(), 1);
        assert_eq!(cache.reads(), 2);
    }
}
