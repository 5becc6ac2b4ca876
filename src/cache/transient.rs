//! Transient Tier - Durable Fallback Store
//!
//! The slowest, largest tier: key/value rows with expiry metadata in the
//! host's durable storage. Survives process restarts, shared by all workers.
//! The on-disk representation is the host's concern; this module only fixes
//! the contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Durable key/value store with TTL semantics
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Get a live value; expired rows read as absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Set a value; `None` TTL means the row never expires on its own
    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()>;

    /// Delete a key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List live keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete rows whose expiry metadata says they are past due
    async fn purge_expired(&self) -> Result<u64>;

    /// Delete rows under `prefix`; with `older_than`, only rows inserted
    /// longer ago than that (retention purge)
    async fn purge_prefix(&self, prefix: &str, older_than: Option<Duration>) -> Result<u64>;

    /// Storage-engine table maintenance
    async fn optimize(&self) -> Result<()>;

    /// Number of rows, including not-yet-purged expired ones
    fn entry_count(&self) -> usize;
}

struct StoredRow {
    value: Value,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl StoredRow {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }
}

/// In-memory transient store for tests and single-node deployments
#[derive(Default)]
pub struct InMemoryTransientStore {
    rows: DashMap<String, StoredRow>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    optimize_runs: AtomicU64,
}

impl InMemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn optimize_runs(&self) -> u64 {
        self.optimize_runs.load(Ordering::Relaxed)
    }

    /// Backdate a row's insertion time (test support for retention purges)
    pub fn age_row(&self, key: &str, age: Duration) {
        if let Some(mut row) = self.rows.get_mut(key) {
            if let Some(backdated) = Instant::now().checked_sub(age) {
                row.inserted_at = backdated;
            }
        }
    }
}

#[async_trait]
impl TransientStore for InMemoryTransientStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let expired = match self.rows.get(key) {
            Some(row) if row.is_expired() => true,
            Some(row) => return Ok(Some(row.value.clone())),
            None => return Ok(None),
        };
        if expired {
            self.rows.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows.insert(
            key.to_string(),
            StoredRow {
                value: value.clone(),
                inserted_at: Instant::now(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.rows.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .rows
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired())
            .map(|e| e.key().clone())
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let expired: Vec<String> = self
            .rows
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        let mut purged = 0;
        for key in expired {
            if self.rows.remove(&key).is_some() {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn purge_prefix(&self, prefix: &str, older_than: Option<Duration>) -> Result<u64> {
        let cutoff = older_than.and_then(|age| Instant::now().checked_sub(age));
        let matches: Vec<String> = self
            .rows
            .iter()
            .filter(|e| {
                e.key().starts_with(prefix)
                    && match cutoff {
                        Some(cutoff) => e.value().inserted_at <= cutoff,
                        None => true,
                    }
            })
            .map(|e| e.key().clone())
            .collect();
        let mut purged = 0;
        for key in matches {
            if self.rows.remove(&key).is_some() {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn optimize(&self) -> Result<()> {
        // Nothing to compact in memory; counted so maintenance runs are visible.
        self.optimize_runs.fetch_add(1, Ordering::Relaxed);
        debug!("transient store optimize pass");
        Ok(())
    }

    fn entry_count(&self) -> usize {
        self.rows.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
