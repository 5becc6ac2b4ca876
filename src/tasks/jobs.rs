//! Job Bodies
//!
//! The four maintenance routines behind [`TaskScheduler`]. Each body is a
//! plain `Result` function; the scheduler wraps the call so failures are
//! logged and never propagate past a run.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::cache::{TTL_EXTENDED, TTL_MEDIUM};
use crate::error::Result;

use super::scheduler::{Job, TaskScheduler};
use super::TASKS_GROUP;

/// Prefix of persisted performance snapshots in the durable store
const PERFORMANCE_KEY_PREFIX: &str = "netdash_background_tasks_performance_";

impl TaskScheduler {
    pub(super) async fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::WidgetDetection => self.detect_widgets().await,
            Job::CacheWarmup => self.warm_caches().await,
            Job::StaleCleanup => self.cleanup_stale().await,
            Job::PerformanceCheck => self.performance_check().await,
        }
    }

    /// Snapshot the registered widgets so the dashboard can render its
    /// widget list without live introspection
    async fn detect_widgets(&self) -> Result<()> {
        let widgets = self.widgets.registered_widgets();
        info!(count = widgets.len(), "widget detection pass");

        self.cache
            .set_serialized("detected_widgets", &widgets, TTL_EXTENDED, TASKS_GROUP)
            .await;
        self.cache
            .set_serialized("widget_detection_last_run", &Utc::now(), TTL_EXTENDED, TASKS_GROUP)
            .await;
        self.log
            .append("widget_detection", json!({ "count": widgets.len() }))
            .await?;
        Ok(())
    }

    /// Pre-compute the headline metrics so the next dashboard load hits
    /// warm caches. Results are discarded; only the cache writes matter.
    async fn warm_caches(&self) -> Result<()> {
        info!("cache warm-up pass");

        if let Err(e) = self.data.total_sites().await {
            warn!(metric = "total_sites", error = %e, "warm-up metric failed");
        }
        if let Err(e) = self.data.total_users().await {
            warn!(metric = "total_users", error = %e, "warm-up metric failed");
        }
        if let Err(e) = self.data.network_information().await {
            warn!(metric = "network_information", error = %e, "warm-up metric failed");
        }
        if let Err(e) = self.data.network_status().await {
            warn!(metric = "network_status", error = %e, "warm-up metric failed");
        }
        Ok(())
    }

    /// Retention purges plus storage-engine maintenance on the durable tier
    async fn cleanup_stale(&self) -> Result<()> {
        let log_purged = self
            .log
            .purge_older_than(self.config.activity_log_retention)
            .await?;

        let store = self.cache.store();
        let samples_purged = store
            .purge_prefix(
                PERFORMANCE_KEY_PREFIX,
                Some(self.config.performance_sample_retention),
            )
            .await?;
        let expired_purged = store.purge_expired().await?;
        store.optimize().await?;

        info!(log_purged, samples_purged, expired_purged, "stale cleanup pass");
        self.log
            .append(
                "stale_cleanup",
                json!({
                    "log_purged": log_purged,
                    "samples_purged": samples_purged,
                    "expired_purged": expired_purged,
                }),
            )
            .await?;
        Ok(())
    }

    /// Sample cache performance, warn on a poor hit ratio or memory
    /// pressure, and persist the snapshot
    async fn performance_check(&self) -> Result<()> {
        if !self.config.monitoring_enabled {
            return Ok(());
        }

        let stats = self.cache.get_performance_stats();
        if stats.hits + stats.misses > 0 && stats.hit_ratio < self.config.hit_ratio_floor {
            warn!(
                hit_ratio = stats.hit_ratio,
                floor = self.config.hit_ratio_floor,
                "cache hit ratio below floor"
            );
        }
        if self.cache.memory().over_pressure() {
            let evicted = self.cache.cleanup();
            warn!(
                usage = stats.memory_usage,
                ceiling = ?stats.memory_ceiling,
                evicted,
                "memory pressure, process tier cleaned"
            );
        }

        self.cache
            .set_serialized("performance_stats", &stats, TTL_MEDIUM, TASKS_GROUP)
            .await;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::derive_key;
    use crate::tasks::test_support::test_scheduler;

    #[tokio::test]
    async fn test_widget_detection_caches_list() {
        let (scheduler, _network) = test_scheduler();
        scheduler.execute(Job::WidgetDetection).await;

        let widgets = scheduler
            .cache
            .get("detected_widgets", TASKS_GROUP)
            .await
            .unwrap();
        let widgets: Vec<String> = serde_json::from_value(widgets).unwrap();
        assert!(widgets.contains(&"storage_data".to_string()));

        assert!(scheduler
            .cache
            .get("widget_detection_last_run", TASKS_GROUP)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_warmup_populates_headline_metrics() {
        let (scheduler, _network) = test_scheduler();
        scheduler.run_warmup_now().await;

        for key in ["total_sites_count", "total_users_count", "network_information", "network_status"] {
            assert!(
                scheduler.cache.get(key, "network_data").await.is_some(),
                "warm-up did not populate {}",
                key
            );
        }
    }

    #[tokio::test]
    async fn test_cleanup_purges_and_optimizes() {
        let (scheduler, _network) = test_scheduler();

        // Seed an expired row directly in the durable tier.
        scheduler
            .cache
            .store()
            .set(
                &derive_key("g", "dead"),
                &json!(1),
                Some(std::time::Duration::ZERO),
            )
            .await
            .unwrap();

        scheduler.run_cleanup_now().await;

        assert_eq!(
            scheduler
                .cache
                .store()
                .get(&derive_key("g", "dead"))
                .await
                .unwrap(),
            None
        );
        // The cleanup pass appends its own audit row.
        let rows = scheduler.log.recent(10).await.unwrap();
        assert!(rows.iter().any(|r| r.action == "stale_cleanup"));
    }

    #[tokio::test]
    async fn test_performance_check_persists_snapshot() {
        let (scheduler, _network) = test_scheduler();
        scheduler.execute(Job::PerformanceCheck).await;

        assert!(scheduler
            .cache
            .get("performance_stats", TASKS_GROUP)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_performance_check_disabled() {
        let (mut scheduler, _network) = test_scheduler();
        scheduler.config.monitoring_enabled = false;

        scheduler.execute(Job::PerformanceCheck).await;
        assert!(scheduler
            .cache
            .get("performance_stats", TASKS_GROUP)
            .await
            .is_none());
    }
}
