//! End-to-end scenarios over the public API: dashboard loads against cold
//! and warm caches, storage ranking, invalidation scoping, the memory
//! circuit breaker, and the background scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use netdash::cache::{
    derive_key, FixedSampler, InMemoryObjectCache, InMemoryTransientStore, MemoryMonitor,
    ObjectCache, TieredCache, TransientStore, TTL_MEDIUM,
};
use netdash::network::{
    build_report, ActivityLog, AggregatorConfig, ContentKind, ContentRecord, ContentStore,
    InMemoryNetwork, NetworkData, SiteDirectory, SiteInfo, StaticWidgetRegistry, StorageStatus,
    UploadsResolver, CACHE_GROUP,
};
use netdash::tasks::{SchedulerConfig, TaskScheduler, TASKS_GROUP};

fn site(id: u64, updated_days_ago: i64) -> SiteInfo {
    SiteInfo {
        id,
        name: format!("Site {}", id),
        domain: format!("site{}.example.com", id),
        path: "/".to_string(),
        last_updated: Utc::now() - chrono::Duration::days(updated_days_ago),
        registered: Utc::now() - chrono::Duration::days(400),
    }
}

fn post(id: u64, site_id: u64, kind: ContentKind, days_ago: i64) -> ContentRecord {
    ContentRecord {
        id,
        site_id,
        kind,
        title: format!("Content {}", id),
        excerpt: "Body excerpt".to_string(),
        author: "editor".to_string(),
        published_at: Utc::now() - chrono::Duration::days(days_ago),
        edit_url: format!("/edit/{}", id),
        view_url: format!("/view/{}", id),
    }
}

fn network_data(network: Arc<InMemoryNetwork>, memory: Arc<MemoryMonitor>) -> NetworkData {
    network_data_with(network, memory, AggregatorConfig::default())
}

fn network_data_with(
    network: Arc<InMemoryNetwork>,
    memory: Arc<MemoryMonitor>,
    config: AggregatorConfig,
) -> NetworkData {
    let cache = Arc::new(TieredCache::new(
        Arc::new(InMemoryTransientStore::new()),
        Some(Arc::new(InMemoryObjectCache::new())),
        Arc::clone(&memory),
    ));
    NetworkData::new(
        cache,
        Arc::clone(&network) as Arc<dyn SiteDirectory>,
        Arc::clone(&network) as Arc<dyn ContentStore>,
        network as Arc<dyn UploadsResolver>,
        memory,
        config,
    )
}

mod dashboard_load_tests {
    use super::*;

    /// Cold-cache dashboard load: three sites, one with a missing content
    /// table, counted once; the warm reload issues no provider queries.
    #[tokio::test]
    async fn test_cold_then_warm_dashboard_load() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        network.add_site(site(2, 2));
        network.add_site(site(3, 3));
        for i in 0..10 {
            network.add_content(post(i, 1, ContentKind::Post, 1));
        }
        for i in 10..15 {
            network.add_content(post(i, 2, ContentKind::Post, 1));
        }
        network.mark_table_missing(3);
        network.set_total_users(30);

        let data = network_data(Arc::clone(&network), Arc::new(MemoryMonitor::unlimited()));

        // Cold load
        assert_eq!(data.total_posts().await.unwrap(), 15);
        assert_eq!(data.total_sites().await.unwrap(), 3);
        assert_eq!(data.total_users().await.unwrap(), 30);
        let cold_count_calls = network.count_calls();
        assert!(cold_count_calls >= 3);

        // The aggregate landed under its own key with a long shelf life.
        assert_eq!(
            data.cache().get("total_posts_count", CACHE_GROUP).await,
            Some(json!(15))
        );

        // Warm reload, fresh request scope: zero count queries.
        data.begin_request();
        assert_eq!(data.total_posts().await.unwrap(), 15);
        assert_eq!(data.total_sites().await.unwrap(), 3);
        assert_eq!(network.count_calls(), cold_count_calls);
    }

    #[tokio::test]
    async fn test_activity_feed_spans_sites() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        network.add_site(site(2, 2));
        network.add_content(post(1, 1, ContentKind::Post, 1));
        network.add_content(post(2, 2, ContentKind::Page, 2));
        network.add_content(post(3, 2, ContentKind::Post, 3));

        let data = network_data(network, Arc::new(MemoryMonitor::unlimited()));
        let records = data.recent_network_activity(10).await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].published_at >= w[1].published_at));
        assert_eq!(records[0].site_name, "Site 1");
    }
}

mod storage_tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    /// Ranking scenario: 500 MB, 50 MB, and 2 GB sites against a 1024 MB
    /// quota, top two requested.
    #[test]
    fn test_storage_ranking_against_quota() {
        let usages = vec![
            (1, "small".to_string(), 500 * MB),
            (2, "tiny".to_string(), 50 * MB),
            (3, "huge".to_string(), 2048 * MB),
        ];
        let report = build_report(usages, 1024 * MB, 2);

        assert_eq!(report.sites.len(), 2);
        assert_eq!(report.sites[0].site_id, 3);
        assert_eq!(report.sites[0].status, StorageStatus::Critical);
        assert!(report.sites[0].usage_percentage > 100.0);
        assert_eq!(report.sites[1].site_id, 1);
        assert_eq!(report.sites[1].status, StorageStatus::Good);

        // Totals still cover the site below the cut.
        assert_eq!(report.total_bytes, 2598 * MB);
        assert_eq!(report.largest_bytes, 2048 * MB);
        assert_eq!(report.sites_scanned, 3);
    }

    #[tokio::test]
    async fn test_storage_report_from_disk() {
        let network = Arc::new(InMemoryNetwork::new());
        let root = tempfile::tempdir().unwrap();
        for (id, kb) in [(1u64, 64usize), (2, 256)] {
            network.add_site(site(id, 1));
            let dir = root.path().join(format!("site{}", id));
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("media.bin"), vec![0u8; kb * 1024]).unwrap();
            network.set_uploads_path(id, dir);
        }

        let config = AggregatorConfig {
            quota_bytes: MB,
            ..AggregatorConfig::default()
        };
        let data = network_data_with(network, Arc::new(MemoryMonitor::unlimited()), config);

        let report = data.storage_usage(10).await.unwrap();
        assert_eq!(report.sites[0].site_id, 2);
        assert_eq!(report.sites[0].bytes_used, 256 * 1024);
        assert_eq!(report.sites[0].usage_percentage, 25.0);
        assert_eq!(report.total_bytes, 320 * 1024);
    }
}

mod invalidation_tests {
    use super::*;

    #[tokio::test]
    async fn test_widget_scoped_invalidation() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        network.set_total_users(9);

        let data = network_data(network, Arc::new(MemoryMonitor::unlimited()));
        data.storage_usage(5).await.unwrap();
        data.total_users().await.unwrap();

        data.clear_widget_cache("storage_data").await;

        // The storage entry is gone from every tier; the unrelated counter
        // survives.
        assert!(data
            .cache()
            .get("storage_usage_data_5", CACHE_GROUP)
            .await
            .is_none());
        assert_eq!(
            data.cache().get("total_users_count", CACHE_GROUP).await,
            Some(json!(9))
        );
    }

    #[tokio::test]
    async fn test_clear_all_leaves_other_groups() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));

        let data = network_data(network, Arc::new(MemoryMonitor::unlimited()));
        data.total_sites().await.unwrap();
        data.cache().set("keep", json!(1), TTL_MEDIUM, "other_group").await;

        data.clear_all_caches().await;

        assert!(data.cache().get("total_sites_count", CACHE_GROUP).await.is_none());
        assert_eq!(data.cache().get("keep", "other_group").await, Some(json!(1)));
    }
}

mod memory_tests {
    use super::*;

    /// Circuit breaker: with the sampler pinned over the pressure threshold
    /// and one-site batches, counting stops after the first batch.
    #[tokio::test]
    async fn test_count_circuit_breaker() {
        let network = Arc::new(InMemoryNetwork::new());
        for id in 1..=6 {
            network.add_site(site(id, 1));
            network.add_content(post(id, id, ContentKind::Post, 1));
        }

        let sampler = Arc::new(FixedSampler::new(850));
        let memory = Arc::new(MemoryMonitor::new(
            Some(1000),
            Arc::clone(&sampler) as Arc<dyn netdash::cache::MemorySampler>,
        ));
        let config = AggregatorConfig {
            count_batch_size: 1,
            ..AggregatorConfig::default()
        };
        let data = network_data_with(Arc::clone(&network), memory, config);

        assert_eq!(data.total_posts().await.unwrap(), 1);

        // Pressure released: invalidate and recount to the true total.
        sampler.set(100);
        data.clear_all_caches().await;
        assert_eq!(data.total_posts().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_tier_fallback_and_backfill() {
        let store = Arc::new(InMemoryTransientStore::new());
        let object = Arc::new(InMemoryObjectCache::new());
        let cache = TieredCache::new(
            Arc::clone(&store) as Arc<dyn netdash::cache::TransientStore>,
            Some(Arc::clone(&object) as Arc<dyn netdash::cache::ObjectCache>),
            Arc::new(MemoryMonitor::unlimited()),
        );

        // Only the durable tier holds the value (a previous process wrote it).
        let full = derive_key("network_data", "total_sites_count");
        store.set(&full, &json!(12), None).await.unwrap();

        assert_eq!(cache.get("total_sites_count", "network_data").await, Some(json!(12)));
        assert_eq!(object.entry_count(), 1);
        assert!(cache.process().get(&full).is_some());
    }
}

mod scheduler_tests {
    use super::*;

    fn scheduler_over(network: Arc<InMemoryNetwork>) -> TaskScheduler {
        let cache = Arc::new(TieredCache::in_memory());
        let data = Arc::new(NetworkData::new(
            Arc::clone(&cache),
            Arc::clone(&network) as Arc<dyn SiteDirectory>,
            Arc::clone(&network) as Arc<dyn ContentStore>,
            network as Arc<dyn UploadsResolver>,
            Arc::new(MemoryMonitor::unlimited()),
            AggregatorConfig::default(),
        ));
        let log = Arc::new(ActivityLog::new(Arc::clone(cache.store())));
        let widgets = Arc::new(StaticWidgetRegistry::new(vec![
            "network_overview".to_string(),
            "storage_data".to_string(),
        ]));
        TaskScheduler::new(cache, data, log, widgets, SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_schedule_run_unschedule_cycle() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        let scheduler = scheduler_over(network);

        scheduler.schedule_all();
        scheduler.schedule_all();
        assert!(scheduler.is_scheduled("netdash_widget_detection"));

        // All four fire once everything is past due.
        let later = Instant::now() + Duration::from_secs(25 * 60 * 60);
        assert_eq!(scheduler.run_pending(later).await, 4);
        assert_eq!(scheduler.run_pending(later).await, 0);

        scheduler.unschedule_all();
        assert!(!scheduler.is_scheduled("netdash_widget_detection"));
    }

    /// Warm-up followed by a dashboard load: the load is answered entirely
    /// from cache.
    #[tokio::test]
    async fn test_warmup_then_dashboard_load() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        network.add_site(site(2, 1));
        network.set_total_users(11);
        let scheduler = scheduler_over(Arc::clone(&network));

        scheduler.run_warmup_now().await;
        let list_calls = network.list_calls();

        // total_sites / total_users / network_information / network_status
        // are all pre-computed; a reload touches no providers.
        let cache = scheduler.cache();
        assert_eq!(cache.get("total_sites_count", CACHE_GROUP).await, Some(json!(2)));
        assert_eq!(cache.get("total_users_count", CACHE_GROUP).await, Some(json!(11)));
        assert!(cache.get("network_information", CACHE_GROUP).await.is_some());
        assert!(cache.get("network_status", CACHE_GROUP).await.is_some());
        assert_eq!(network.list_calls(), list_calls);
    }

    #[tokio::test]
    async fn test_detection_and_check_bookkeeping() {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(site(1, 1));
        let scheduler = scheduler_over(network);

        let later = Instant::now() + Duration::from_secs(25 * 60 * 60);
        scheduler.schedule_all();
        scheduler.run_pending(later).await;

        let cache = scheduler.cache();
        assert!(cache.get("detected_widgets", TASKS_GROUP).await.is_some());
        assert!(cache.get("widget_detection_last_run", TASKS_GROUP).await.is_some());
        assert!(cache.get("performance_stats", TASKS_GROUP).await.is_some());
    }
}
