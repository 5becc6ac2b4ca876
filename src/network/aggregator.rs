//! Network Data Aggregator
//!
//! Cross-site metrics for the dashboard widgets. Every metric method follows
//! the same shape: derive a cache key, try the tiered cache, compute from
//! the providers on a miss, write back with the metric's TTL class. Per-site
//! failures degrade to zero or empty contributions so one broken site never
//! blanks a network-wide widget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{
    MemoryMonitor, QueryCache, TieredCache, TTL_EXTENDED, TTL_LONG, TTL_MEDIUM, TTL_SHORT,
};
use crate::error::{Error, Result};

use super::activity::{
    relative_time, trim_excerpt, ActivityStatus, NetworkActivityRecord, SiteActivityRecord,
};
use super::provider::{
    ContentKind, ContentStore, NetworkSettings, SiteDirectory, SiteInfo, UploadsResolver,
};
use super::query_key;
use super::storage::{build_report, directory_size, StorageReport};
use super::{
    ACTIVITY_PAGES_PER_SITE, ACTIVITY_POSTS_PER_SITE, ACTIVITY_SAMPLE_SITES, CACHE_GROUP,
    COUNT_BATCH_SIZE, EXCERPT_MAX_CHARS, MAX_AGGREGATE_SITES, STORAGE_SITE_LIMIT,
};

/// Aggregation caps and quotas, overridable per deployment
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Hard cap on sites considered by network-wide counts
    pub max_aggregate_sites: usize,
    /// Sites per counting batch between circuit-breaker checks
    pub count_batch_size: usize,
    /// Hard cap on sites scanned for storage
    pub storage_site_limit: usize,
    /// Files visited per site before the walk stops
    pub storage_file_cap: usize,
    /// Per-site upload quota in bytes
    pub quota_bytes: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_aggregate_sites: MAX_AGGREGATE_SITES,
            count_batch_size: COUNT_BATCH_SIZE,
            storage_site_limit: STORAGE_SITE_LIMIT,
            storage_file_cap: super::STORAGE_FILE_CAP,
            quota_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Network identity and configuration summary for the overview widget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInformation {
    pub site_name: String,
    pub admin_email: String,
    pub registration: String,
    pub subdomain_install: bool,
    pub total_sites: u64,
    pub total_users: u64,
}

/// Upload and registration policy summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisiteConfiguration {
    pub subdomain_install: bool,
    pub upload_quota_mb: u64,
    pub max_upload_size_kb: u64,
    pub upload_filetypes: Vec<String>,
    pub registration: String,
}

/// Coarse health snapshot for the status widget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub total_sites: u64,
    pub object_cache_active: bool,
    pub cache_hit_ratio: f64,
    pub memory_usage: u64,
    pub memory_ceiling: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// Cross-site metric aggregator behind the tiered cache
pub struct NetworkData {
    cache: Arc<TieredCache>,
    sites: Arc<dyn SiteDirectory>,
    content: Arc<dyn ContentStore>,
    uploads: Arc<dyn UploadsResolver>,
    memory: Arc<MemoryMonitor>,
    queries: QueryCache,
    config: AggregatorConfig,
}

impl NetworkData {
    pub fn new(
        cache: Arc<TieredCache>,
        sites: Arc<dyn SiteDirectory>,
        content: Arc<dyn ContentStore>,
        uploads: Arc<dyn UploadsResolver>,
        memory: Arc<MemoryMonitor>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            cache,
            sites,
            content,
            uploads,
            memory,
            queries: QueryCache::new(),
            config,
        }
    }

    /// Reset request-scoped state. Call between logical dashboard requests.
    pub fn begin_request(&self) {
        self.queries.clear();
        self.cache.cleanup();
    }

    /// Cache handle (invalidation, stats)
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    // =========================================================================
    // Simple counters
    // =========================================================================

    /// Total sites in the network
    pub async fn total_sites(&self) -> Result<u64> {
        if let Some(count) = self.cache_get("total_sites_count").await {
            return Ok(count);
        }
        let count = self.sites.total_site_count().await?;
        self.cache_put("total_sites_count", &count, TTL_LONG).await;
        Ok(count)
    }

    /// Total users across the network
    pub async fn total_users(&self) -> Result<u64> {
        if let Some(count) = self.cache_get("total_users_count").await {
            return Ok(count);
        }
        let count = self.sites.total_user_count().await?;
        self.cache_put("total_users_count", &count, TTL_LONG).await;
        Ok(count)
    }

    /// Published posts across all active sites
    pub async fn total_posts(&self) -> Result<u64> {
        if let Some(count) = self.cache_get("total_posts_count").await {
            return Ok(count);
        }
        let count = self.count_published_across(ContentKind::Post).await?;
        self.cache_put("total_posts_count", &count, TTL_EXTENDED).await;
        Ok(count)
    }

    /// Published pages across all active sites
    pub async fn total_pages(&self) -> Result<u64> {
        if let Some(count) = self.cache_get("total_pages_count").await {
            return Ok(count);
        }
        let count = self.count_published_across(ContentKind::Page).await?;
        self.cache_put("total_pages_count", &count, TTL_EXTENDED).await;
        Ok(count)
    }

    /// Count published content of one kind across every active site.
    ///
    /// Sites are processed in batches; after each batch the memory monitor
    /// is consulted and, over the pressure threshold, the partial sum is
    /// returned rather than risking the process. A site whose content table
    /// is missing contributes zero.
    async fn count_published_across(&self, kind: ContentKind) -> Result<u64> {
        let sites = self.active_sites_cached(self.config.max_aggregate_sites).await?;

        let mut total = 0u64;
        for batch in sites.chunks(self.config.count_batch_size) {
            let counts = future::join_all(
                batch
                    .iter()
                    .map(|site| self.content.count_published(site.id, kind)),
            )
            .await;
            for (site, result) in batch.iter().zip(counts) {
                match result {
                    Ok(count) => total += count,
                    Err(Error::MissingContentTable { site_id }) => {
                        debug!(site_id, %kind, "content table missing, counting zero");
                    }
                    Err(e) => {
                        warn!(site_id = site.id, %kind, error = %e, "site count failed, counting zero");
                    }
                }
            }
            if self.memory.over_pressure() {
                warn!(
                    %kind,
                    partial = total,
                    "memory pressure during network count, returning partial sum"
                );
                return Ok(total);
            }
        }
        Ok(total)
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Storage report over the heaviest sites.
    ///
    /// Per-site byte counts are cached individually under long TTLs so a
    /// report refresh only re-walks sites whose entries expired.
    pub async fn storage_usage(&self, limit: usize) -> Result<StorageReport> {
        let key = format!("storage_usage_data_{}", limit);
        if let Some(report) = self.cache_get(&key).await {
            return Ok(report);
        }

        let sites = self.active_sites_cached(self.config.storage_site_limit).await?;
        let mut usages = Vec::with_capacity(sites.len());
        for site in &sites {
            let bytes = self.site_storage_bytes(site.id).await;
            usages.push((site.id, site.name.clone(), bytes));
        }

        let report = build_report(usages, self.config.quota_bytes, limit);
        self.cache_put(&key, &report, TTL_MEDIUM).await;
        Ok(report)
    }

    /// One site's upload bytes, individually cached
    async fn site_storage_bytes(&self, site_id: u64) -> u64 {
        let key = format!("site_storage_{}", site_id);
        if let Some(bytes) = self.cache_get(&key).await {
            return bytes;
        }

        let bytes = match self.uploads.uploads_path(site_id) {
            Some(path) => directory_size(&path, self.config.storage_file_cap),
            None => 0,
        };
        self.cache_put(&key, &bytes, TTL_LONG).await;
        bytes
    }

    // =========================================================================
    // Activity
    // =========================================================================

    /// Latest published content across a sample of recently-updated sites,
    /// merged and sorted newest first
    pub async fn recent_network_activity(&self, limit: usize) -> Result<Vec<NetworkActivityRecord>> {
        let key = format!("recent_network_activity_{}", limit);
        if let Some(records) = self.cache_get(&key).await {
            return Ok(records);
        }

        let sites = self.sites.recently_updated_sites(ACTIVITY_SAMPLE_SITES).await?;
        let now = Utc::now();
        let mut records = Vec::new();
        for site in &sites {
            for (kind, per_site) in [
                (ContentKind::Post, ACTIVITY_POSTS_PER_SITE),
                (ContentKind::Page, ACTIVITY_PAGES_PER_SITE),
            ] {
                match self.content.recent_published(site.id, kind, per_site).await {
                    Ok(rows) => {
                        for row in rows {
                            records.push(NetworkActivityRecord {
                                site_id: site.id,
                                site_name: site.name.clone(),
                                content_id: row.id,
                                kind: row.kind,
                                title: row.title,
                                excerpt: trim_excerpt(&row.excerpt, EXCERPT_MAX_CHARS),
                                author: row.author,
                                published_at: row.published_at,
                                published_relative: relative_time(row.published_at, now),
                                edit_url: row.edit_url,
                                view_url: row.view_url,
                            });
                        }
                    }
                    Err(e) => {
                        warn!(site_id = site.id, %kind, error = %e, "activity sample failed, skipping site");
                    }
                }
            }
        }

        records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        records.truncate(limit);

        self.cache_put(&key, &records, TTL_SHORT).await;
        Ok(records)
    }

    /// Most recently active sites with user counts and liveness status.
    ///
    /// Candidates are twice the requested limit so sites whose true last
    /// activity (latest post or comment) beats their recorded update time
    /// can still make the cut after re-sorting.
    pub async fn recent_active_sites(&self, limit: usize) -> Result<Vec<SiteActivityRecord>> {
        let key = format!("recent_active_sites_{}", limit);
        if let Some(records) = self.cache_get(&key).await {
            return Ok(records);
        }

        let candidates = self.sites.recently_updated_sites(limit * 2).await?;
        let now = Utc::now();
        let mut records = Vec::with_capacity(candidates.len());
        for site in &candidates {
            let user_count = match self.sites.site_user_count(site.id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(site_id = site.id, error = %e, "user count failed, reporting zero");
                    0
                }
            };
            let last_activity = self.last_activity_for(site).await;
            records.push(SiteActivityRecord {
                site_id: site.id,
                site_name: site.name.clone(),
                domain: site.domain.clone(),
                path: site.path.clone(),
                user_count,
                last_activity,
                last_activity_relative: relative_time(last_activity, now),
                status: ActivityStatus::classify(last_activity, now),
            });
        }

        records.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        records.truncate(limit);

        self.cache_put(&key, &records, TTL_MEDIUM).await;
        Ok(records)
    }

    /// Max of latest post and comment dates, falling back to the site's
    /// recorded update time
    async fn last_activity_for(&self, site: &SiteInfo) -> DateTime<Utc> {
        let post = self.content.latest_post_date(site.id).await.ok().flatten();
        let comment = self.content.latest_comment_date(site.id).await.ok().flatten();
        post.into_iter()
            .chain(comment)
            .max()
            .unwrap_or(site.last_updated)
    }

    // =========================================================================
    // Settings and status
    // =========================================================================

    /// Raw network settings (cached)
    pub async fn network_settings_overview(&self) -> Result<NetworkSettings> {
        if let Some(settings) = self.cache_get("network_settings_overview").await {
            return Ok(settings);
        }
        let settings = self.sites.network_settings().await?;
        self.cache_put("network_settings_overview", &settings, TTL_LONG).await;
        Ok(settings)
    }

    /// Upload and registration policy summary
    pub async fn multisite_configuration(&self) -> Result<MultisiteConfiguration> {
        if let Some(config) = self.cache_get("multisite_configuration").await {
            return Ok(config);
        }
        let settings = self.sites.network_settings().await?;
        let config = MultisiteConfiguration {
            subdomain_install: settings.subdomain_install,
            upload_quota_mb: settings.upload_quota_mb,
            max_upload_size_kb: settings.max_upload_size_kb,
            upload_filetypes: settings.upload_filetypes,
            registration: settings.registration,
        };
        self.cache_put("multisite_configuration", &config, TTL_EXTENDED).await;
        Ok(config)
    }

    /// Network identity plus headline counts
    pub async fn network_information(&self) -> Result<NetworkInformation> {
        if let Some(info) = self.cache_get("network_information").await {
            return Ok(info);
        }
        let settings = self.sites.network_settings().await?;
        let info = NetworkInformation {
            site_name: settings.site_name,
            admin_email: settings.admin_email,
            registration: settings.registration,
            subdomain_install: settings.subdomain_install,
            total_sites: self.total_sites().await?,
            total_users: self.total_users().await?,
        };
        self.cache_put("network_information", &info, TTL_LONG).await;
        Ok(info)
    }

    /// Coarse health snapshot, cached only briefly
    pub async fn network_status(&self) -> Result<NetworkStatus> {
        if let Some(status) = self.cache_get("network_status").await {
            return Ok(status);
        }
        let perf = self.cache.get_performance_stats();
        let status = NetworkStatus {
            total_sites: self.total_sites().await?,
            object_cache_active: perf.object_cache_active,
            cache_hit_ratio: perf.hit_ratio,
            memory_usage: perf.memory_usage,
            memory_ceiling: perf.memory_ceiling,
            checked_at: Utc::now(),
        };
        self.cache_put("network_status", &status, TTL_SHORT).await;
        Ok(status)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop the cache entries backing one widget. Limit-parameterized keys
    /// are cleared by prefix so every cached variant goes at once. Unknown
    /// widget names are logged and ignored.
    pub async fn clear_widget_cache(&self, widget: &str) {
        let (keys, prefixes): (&[&str], &[&str]) = match widget {
            "network_overview" => (
                &[
                    "total_sites_count",
                    "total_users_count",
                    "total_posts_count",
                    "total_pages_count",
                    "network_information",
                ],
                &[],
            ),
            "storage_data" => (&[], &["storage_usage_data_", "site_storage_"]),
            "recent_activity" => (&[], &["recent_network_activity_"]),
            "active_sites" => (&[], &["recent_active_sites_"]),
            "network_settings" => (
                &["network_settings_overview", "multisite_configuration"],
                &[],
            ),
            "network_status" => (&["network_status"], &[]),
            other => {
                debug!(widget = other, "no cache entries mapped to widget");
                return;
            }
        };

        let mut purged = 0u64;
        for key in keys {
            self.cache.delete(key, CACHE_GROUP).await;
            purged += 1;
        }
        for prefix in prefixes {
            purged += self.cache.flush_prefix(prefix, CACHE_GROUP).await;
        }
        info!(widget, purged, "widget cache cleared");
    }

    /// Drop every aggregate this module ever cached
    pub async fn clear_all_caches(&self) {
        let purged = self.cache.flush_group(CACHE_GROUP).await;
        self.queries.clear();
        info!(purged, "all network data caches cleared");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Active-site list, deduplicated within one request via the query
    /// micro-cache
    async fn active_sites_cached(&self, limit: usize) -> Result<Vec<SiteInfo>> {
        let fp = query_key("active_sites", limit);
        if let Some(value) = self.queries.get(fp) {
            if let Ok(sites) = serde_json::from_value(value) {
                return Ok(sites);
            }
        }
        let sites = self.sites.active_sites(limit).await?;
        if let Ok(value) = serde_json::to_value(&sites) {
            self.queries.insert(fp, value);
        }
        Ok(sites)
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key, CACHE_GROUP).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                // Stale shape from an older build; drop it and recompute.
                warn!(key, error = %e, "cached value has unexpected shape, discarding");
                self.cache.delete(key, CACHE_GROUP).await;
                None
            }
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: std::time::Duration) {
        self.cache.set_serialized(key, value, ttl, CACHE_GROUP).await;
    }
}

impl std::fmt::Debug for NetworkData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkData")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
