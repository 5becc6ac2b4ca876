//! Activity Audit Log
//!
//! Append-only audit rows in the durable store, one row per administrative
//! or scheduled action. Rows never expire on their own; the cleanup job
//! applies a retention window through [`ActivityLog::purge_older_than`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::TransientStore;
use crate::error::Result;

const LOG_KEY_PREFIX: &str = "netdash_activity_log_";

/// One audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub action: String,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only audit writer over the durable store
pub struct ActivityLog {
    store: Arc<dyn TransientStore>,
    sequence: AtomicU64,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn TransientStore>) -> Self {
        Self {
            store,
            sequence: AtomicU64::new(0),
        }
    }

    /// Append one row. Keys carry a timestamp plus a per-process sequence so
    /// rows written in the same millisecond never collide.
    pub async fn append(&self, action: &str, details: Value) -> Result<()> {
        let entry = LogEntry {
            action: action.to_string(),
            details,
            recorded_at: Utc::now(),
        };
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let key = format!(
            "{}{}_{}",
            LOG_KEY_PREFIX,
            entry.recorded_at.timestamp_millis(),
            seq
        );
        let value = serde_json::to_value(&entry)?;
        self.store.set(&key, &value, None).await?;
        debug!(action, key, "activity log row appended");
        Ok(())
    }

    /// Most recent rows, newest first, capped at `limit`
    pub async fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let keys = self.store.keys_with_prefix(LOG_KEY_PREFIX).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.store.get(&key).await? {
                if let Ok(entry) = serde_json::from_value::<LogEntry>(value) {
                    entries.push(entry);
                }
            }
        }
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Delete rows older than `age`, returning the count removed
    pub async fn purge_older_than(&self, age: std::time::Duration) -> Result<u64> {
        self.store.purge_prefix(LOG_KEY_PREFIX, Some(age)).await
    }
}

// =============================================================================
// Tests
// =============================================================================
