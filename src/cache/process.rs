//! Process Tier - Request-Lifetime In-Memory Cache
//!
//! The fastest, smallest tier. Entries live at most one short TTL so process
//! memory never holds data safely past a request, and the tier's resident
//! bytes are bounded by a budget enforced at cleanup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use super::entry::ProcessEntry;

/// In-process cache tier
#[derive(Debug, Default)]
pub struct ProcessCache {
    /// Entries keyed by the derived (prefix_group_key) string
    entries: DashMap<String, ProcessEntry>,
    /// Accounted resident bytes (estimated)
    current_size: AtomicU64,
    /// Entries evicted over the tier's lifetime
    evictions: AtomicU64,
}

impl ProcessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value; expired entries are evicted lazily and read as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.remove(key);
        }
        None
    }

    /// Insert a value. The caller (the manager) clamps the TTL.
    pub fn insert(&self, key: String, value: Value, ttl: Duration) {
        let entry = ProcessEntry::new(value, ttl);
        let new_size = entry.size;
        if let Some(old) = self.entries.insert(key, entry) {
            self.current_size.fetch_sub(old.size, Ordering::Relaxed);
        }
        self.current_size.fetch_add(new_size, Ordering::Relaxed);
    }

    /// Remove a key. Absence is not an error.
    pub fn remove(&self, key: &str) -> bool {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove every key starting with `prefix`, returning the count removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.remove(&key) {
                removed += 1;
            }
        }
        removed
    }

    /// Stored expiry instant for a key, if present (used by TTL-clamp checks)
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.entries.get(key).map(|e| e.expires_at)
    }

    /// Evict every expired entry, returning the count evicted.
    pub fn evict_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_expired())
            .map(|e| e.key().clone())
            .collect();
        let mut evicted = 0;
        for key in expired {
            if self.remove(&key) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted += 1;
            }
        }
        evicted
    }

    /// Evict oldest-first until accounted bytes fall under `budget`.
    pub fn evict_to_budget(&self, budget: u64) -> usize {
        if self.size() <= budget {
            return 0;
        }

        // Oldest creation time first - deterministic, no LRU tracking
        let mut candidates: Vec<(String, Instant, u64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.created_at, e.size))
            .collect();
        candidates.sort_by_key(|(_, created_at, _)| *created_at);

        let mut evicted = 0;
        for (key, _, _) in candidates {
            if self.size() <= budget {
                break;
            }
            if self.remove(&key) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted += 1;
            }
        }
        evicted
    }

    /// Clear the tier
    pub fn clear(&self) {
        self.entries.clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tier is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accounted resident bytes
    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Lifetime eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
