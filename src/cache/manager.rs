//! Tiered Cache Manager
//!
//! Orchestrates the process, object-cache, and transient tiers with
//! read-through backfill and write-through fan-out. Caching is strictly
//! best-effort: no tier operation ever surfaces an error to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::derive_key;
use super::memory::MemoryMonitor;
use super::object::{InMemoryObjectCache, ObjectCache};
use super::process::ProcessCache;
use super::transient::{InMemoryTransientStore, TransientStore};
use super::{KEY_PREFIX, TTL_MEDIUM, TTL_SHORT};

/// Three-tier cache manager
pub struct TieredCache {
    /// In-process tier, private to this manager's lifetime
    process: ProcessCache,
    /// Shared object-cache tier; availability fixed at construction
    object: Option<Arc<dyn ObjectCache>>,
    /// Durable fallback tier
    store: Arc<dyn TransientStore>,
    /// Memory monitor gating process-tier writes
    memory: Arc<MemoryMonitor>,
    /// Manager-level hit count (any tier)
    hits: AtomicU64,
    /// Manager-level miss count (absent everywhere)
    misses: AtomicU64,
}

impl TieredCache {
    /// Create a manager over the given tiers
    pub fn new(
        store: Arc<dyn TransientStore>,
        object: Option<Arc<dyn ObjectCache>>,
        memory: Arc<MemoryMonitor>,
    ) -> Self {
        Self {
            process: ProcessCache::new(),
            object,
            store,
            memory,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fully in-memory manager with all tiers active (for testing)
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTransientStore::new()),
            Some(Arc::new(InMemoryObjectCache::new())),
            Arc::new(MemoryMonitor::unlimited()),
        )
    }

    /// Get a value, searching process → object → durable.
    ///
    /// Hits backfill the cheaper tiers; tier errors read as absent. A miss
    /// is not an error - callers fall through to computing the true value.
    pub async fn get(&self, key: &str, group: &str) -> Option<Value> {
        let full = derive_key(group, key);

        if let Some(value) = self.process.get(&full) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        if let Some(object) = &self.object {
            match object.get(&full).await {
                Ok(Some(value)) => {
                    self.backfill_process(&full, &value);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => warn!(key = %full, error = %e, "object cache read failed, treating as miss"),
            }
        }

        match self.store.get(&full).await {
            Ok(Some(value)) => {
                if let Some(object) = &self.object {
                    if let Err(e) = object.set(&full, &value, TTL_MEDIUM).await {
                        warn!(key = %full, error = %e, "object cache backfill failed");
                    }
                }
                self.backfill_process(&full, &value);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(key = %full, error = %e, "transient store read failed, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Write a value through every tier.
    ///
    /// The durable and object tiers get the full requested TTL; the process
    /// tier is written only when memory headroom allows and its TTL is
    /// clamped to [`TTL_SHORT`]. Lower-tier failures are swallowed - the
    /// call reports success on the best-effort contract.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration, group: &str) -> bool {
        let full = derive_key(group, key);

        if let Err(e) = self.store.set(&full, &value, Some(ttl)).await {
            warn!(key = %full, error = %e, "transient store write failed");
        }

        if let Some(object) = &self.object {
            if let Err(e) = object.set(&full, &value, ttl).await {
                warn!(key = %full, error = %e, "object cache write failed");
            }
        }

        // Re-evaluated on every write attempt, never cached
        if self.memory.headroom_ok() {
            self.process.insert(full, value, ttl.min(TTL_SHORT));
        } else {
            debug!(key = %key, "memory headroom exhausted, skipping process tier");
        }

        true
    }

    /// Serialize and write through (convenience for typed callers)
    pub async fn set_serialized<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        group: &str,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v, ttl, group).await,
            Err(e) => {
                warn!(key = %key, error = %e, "value not serializable, skipping cache write");
                false
            }
        }
    }

    /// Delete a key from every tier. Tier-level absence is not an error.
    pub async fn delete(&self, key: &str, group: &str) -> bool {
        let full = derive_key(group, key);

        self.process.remove(&full);

        if let Some(object) = &self.object {
            if let Err(e) = object.delete(&full).await {
                warn!(key = %full, error = %e, "object cache delete failed");
            }
        }

        if let Err(e) = self.store.delete(&full).await {
            warn!(key = %full, error = %e, "transient store delete failed");
        }

        true
    }

    /// End-of-request eviction pass over the process tier.
    ///
    /// Evicts expired entries first; if the tier's resident bytes still
    /// exceed its budget, evicts oldest-first until back under. Returns the
    /// count evicted.
    pub fn cleanup(&self) -> usize {
        let mut evicted = self.process.evict_expired();
        if let Some(budget) = self.memory.process_budget() {
            evicted += self.process.evict_to_budget(budget);
        }
        if evicted > 0 {
            debug!(evicted, "process tier cleanup");
        }
        evicted
    }

    /// Purge one group's keys from every tier
    pub async fn flush_group(&self, group: &str) -> u64 {
        self.flush_full_prefix(&format!("{}_{}_", KEY_PREFIX, group))
            .await
    }

    /// Purge every key in `group` starting with `key_prefix` from every tier
    pub async fn flush_prefix(&self, key_prefix: &str, group: &str) -> u64 {
        self.flush_full_prefix(&derive_key(group, key_prefix)).await
    }

    async fn flush_full_prefix(&self, prefix: &str) -> u64 {
        let mut purged = self.process.remove_prefix(prefix) as u64;

        if let Some(object) = &self.object {
            match object.purge_prefix(prefix).await {
                Ok(n) => purged += n,
                Err(e) => warn!(prefix, error = %e, "object cache prefix flush failed"),
            }
        }

        match self.store.purge_prefix(prefix, None).await {
            Ok(n) => purged += n,
            Err(e) => warn!(prefix, error = %e, "transient store prefix flush failed"),
        }

        purged
    }

    /// Drop everything this manager ever wrote, across all tiers
    pub async fn flush_all(&self) {
        self.process.clear();

        let prefix = format!("{}_", KEY_PREFIX);
        if let Some(object) = &self.object {
            if let Err(e) = object.purge_prefix(&prefix).await {
                warn!(error = %e, "object cache flush failed");
            }
        }
        if let Err(e) = self.store.purge_prefix(&prefix, None).await {
            warn!(error = %e, "transient store flush failed");
        }
    }

    /// Hit/miss and memory statistics
    pub fn get_performance_stats(&self) -> PerformanceStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };

        PerformanceStats {
            hits,
            misses,
            hit_ratio,
            memory_usage: self.memory.usage(),
            memory_peak: self.memory.peak(),
            memory_ceiling: self.memory.ceiling(),
            process_entries: self.process.len(),
            object_cache_active: self.object.is_some(),
        }
    }

    /// Per-tier entry counts and sizes
    pub fn get_cache_stats(&self) -> CacheStats {
        CacheStats {
            process_entries: self.process.len(),
            process_size_bytes: self.process.size(),
            process_evictions: self.process.evictions(),
            object_entries: self.object.as_ref().map(|o| o.entry_count()),
            object_cache_active: self.object.is_some(),
            store_entries: self.store.entry_count(),
        }
    }

    /// Process tier handle (expiry inspection in tests, cleanup hooks)
    pub fn process(&self) -> &ProcessCache {
        &self.process
    }

    /// Durable tier handle
    pub fn store(&self) -> &Arc<dyn TransientStore> {
        &self.store
    }

    /// Memory monitor handle
    pub fn memory(&self) -> &Arc<MemoryMonitor> {
        &self.memory
    }

    fn backfill_process(&self, full_key: &str, value: &Value) {
        if self.memory.headroom_ok() {
            self.process
                .insert(full_key.to_string(), value.clone(), TTL_SHORT);
        }
    }
}

/// Hit-ratio and memory statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub hits: u64,
    pub misses: u64,
    /// Percentage 0-100; 0.0 when there are no samples
    pub hit_ratio: f64,
    pub memory_usage: u64,
    pub memory_peak: u64,
    pub memory_ceiling: Option<u64>,
    pub process_entries: usize,
    pub object_cache_active: bool,
}

/// Per-tier occupancy snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub process_entries: usize,
    pub process_size_bytes: u64,
    pub process_evictions: u64,
    pub object_entries: Option<usize>,
    pub object_cache_active: bool,
    pub store_entries: usize,
}

// =============================================================================
// Tests
// =============================================================================
