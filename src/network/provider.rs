//! Host-Environment Providers
//!
//! Traits the surrounding platform implements: the site directory, per-site
//! content queries, upload-directory resolution, and dashboard-widget
//! introspection. Every query takes an explicit site id - there is no
//! ambient "current site" to switch into.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One site in the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Site (blog) identifier
    pub id: u64,
    /// Human name
    pub name: String,
    /// Domain
    pub domain: String,
    /// Path under the domain
    pub path: String,
    /// Last recorded content update
    pub last_updated: DateTime<Utc>,
    /// Registration date
    pub registered: DateTime<Utc>,
}

/// Content type within a site's content table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Page,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Post => write!(f, "post"),
            ContentKind::Page => write!(f, "page"),
        }
    }
}

/// One published content row from a site's content table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: u64,
    pub site_id: u64,
    pub kind: ContentKind,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub edit_url: String,
    pub view_url: String,
}

/// Network-wide configuration the host exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub site_name: String,
    pub admin_email: String,
    /// Registration policy: "none", "user", "blog", or "all"
    pub registration: String,
    /// Per-site upload quota in megabytes
    pub upload_quota_mb: u64,
    /// Maximum single-upload size in kilobytes
    pub max_upload_size_kb: u64,
    /// Allowed upload file types
    pub upload_filetypes: Vec<String>,
    /// Whether the network uses subdomains rather than subdirectories
    pub subdomain_install: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            site_name: "Network".to_string(),
            admin_email: "admin@example.com".to_string(),
            registration: "none".to_string(),
            upload_quota_mb: 1024,
            max_upload_size_kb: 1500,
            upload_filetypes: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "gif".to_string(),
                "pdf".to_string(),
            ],
            subdomain_install: false,
        }
    }
}

/// Directory of sites in the network
///
/// "Active" excludes archived, spam, and deleted sites; implementations
/// apply those filters before returning.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Active sites, capped at `limit`
    async fn active_sites(&self, limit: usize) -> Result<Vec<SiteInfo>>;

    /// Active sites ordered by last update, newest first, capped at `limit`
    async fn recently_updated_sites(&self, limit: usize) -> Result<Vec<SiteInfo>>;

    /// Total site count across the network
    async fn total_site_count(&self) -> Result<u64>;

    /// Total user count across the network
    async fn total_user_count(&self) -> Result<u64>;

    /// User count for one site
    async fn site_user_count(&self, site_id: u64) -> Result<u64>;

    /// Network-wide settings
    async fn network_settings(&self) -> Result<NetworkSettings>;
}

/// Per-site content queries, addressed directly by site id
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Count published rows of a kind in one site's content table.
    ///
    /// Returns [`Error::MissingContentTable`] for pending/broken sites.
    async fn count_published(&self, site_id: u64, kind: ContentKind) -> Result<u64>;

    /// Most recent published rows of a kind, newest first
    async fn recent_published(
        &self,
        site_id: u64,
        kind: ContentKind,
        limit: usize,
    ) -> Result<Vec<ContentRecord>>;

    /// Date of the site's latest published post
    async fn latest_post_date(&self, site_id: u64) -> Result<Option<DateTime<Utc>>>;

    /// Date of the site's latest approved comment
    async fn latest_comment_date(&self, site_id: u64) -> Result<Option<DateTime<Utc>>>;
}

/// Resolves a site's upload directory on disk
pub trait UploadsResolver: Send + Sync {
    /// Absolute path to the site's uploads, or `None` if it has none yet
    fn uploads_path(&self, site_id: u64) -> Option<PathBuf>;
}

/// Introspects currently-registered dashboard widgets
pub trait WidgetRegistry: Send + Sync {
    fn registered_widgets(&self) -> Vec<String>;
}

/// Fixed widget list (for testing and static deployments)
#[derive(Debug, Default)]
pub struct StaticWidgetRegistry {
    widgets: Vec<String>,
}

impl StaticWidgetRegistry {
    pub fn new(widgets: Vec<String>) -> Self {
        Self { widgets }
    }
}

impl WidgetRegistry for StaticWidgetRegistry {
    fn registered_widgets(&self) -> Vec<String> {
        self.widgets.clone()
    }
}

// =============================================================================
// In-memory network fixture
// =============================================================================

/// In-memory network for testing
///
/// Implements every provider trait over plain maps, with call counters so
/// tests can prove that cached reads skip the providers entirely.
#[derive(Default)]
pub struct InMemoryNetwork {
    sites: RwLock<Vec<SiteInfo>>,
    content: DashMap<u64, Vec<ContentRecord>>,
    missing_tables: DashMap<u64, ()>,
    site_users: DashMap<u64, u64>,
    comment_dates: DashMap<u64, DateTime<Utc>>,
    uploads: DashMap<u64, PathBuf>,
    settings: RwLock<NetworkSettings>,
    total_users: AtomicU64,
    count_calls: AtomicU64,
    list_calls: AtomicU64,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&self, site: SiteInfo) {
        self.sites.write().push(site);
    }

    pub fn add_content(&self, record: ContentRecord) {
        self.content.entry(record.site_id).or_default().push(record);
    }

    /// Mark a site's content table as missing (pending/broken site)
    pub fn mark_table_missing(&self, site_id: u64) {
        self.missing_tables.insert(site_id, ());
    }

    pub fn set_site_user_count(&self, site_id: u64, count: u64) {
        self.site_users.insert(site_id, count);
    }

    pub fn set_total_users(&self, count: u64) {
        self.total_users.store(count, Ordering::Relaxed);
    }

    pub fn set_comment_date(&self, site_id: u64, date: DateTime<Utc>) {
        self.comment_dates.insert(site_id, date);
    }

    pub fn set_uploads_path(&self, site_id: u64, path: PathBuf) {
        self.uploads.insert(site_id, path);
    }

    pub fn set_settings(&self, settings: NetworkSettings) {
        *self.settings.write() = settings;
    }

    /// Count-query invocations observed (instrumentation)
    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(Ordering::Relaxed)
    }

    /// Site-list invocations observed (instrumentation)
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SiteDirectory for InMemoryNetwork {
    async fn active_sites(&self, limit: usize) -> Result<Vec<SiteInfo>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.sites.read().iter().take(limit).cloned().collect())
    }

    async fn recently_updated_sites(&self, limit: usize) -> Result<Vec<SiteInfo>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let mut sites = self.sites.read().clone();
        sites.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        sites.truncate(limit);
        Ok(sites)
    }

    async fn total_site_count(&self) -> Result<u64> {
        Ok(self.sites.read().len() as u64)
    }

    async fn total_user_count(&self) -> Result<u64> {
        Ok(self.total_users.load(Ordering::Relaxed))
    }

    async fn site_user_count(&self, site_id: u64) -> Result<u64> {
        Ok(self.site_users.get(&site_id).map(|c| *c).unwrap_or(0))
    }

    async fn network_settings(&self) -> Result<NetworkSettings> {
        Ok(self.settings.read().clone())
    }
}

#[async_trait]
impl ContentStore for InMemoryNetwork {
    async fn count_published(&self, site_id: u64, kind: ContentKind) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::Relaxed);
        if self.missing_tables.contains_key(&site_id) {
            return Err(Error::MissingContentTable { site_id });
        }
        Ok(self
            .content
            .get(&site_id)
            .map(|rows| rows.iter().filter(|r| r.kind == kind).count() as u64)
            .unwrap_or(0))
    }

    async fn recent_published(
        &self,
        site_id: u64,
        kind: ContentKind,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        if self.missing_tables.contains_key(&site_id) {
            return Err(Error::MissingContentTable { site_id });
        }
        let mut rows: Vec<ContentRecord> = self
            .content
            .get(&site_id)
            .map(|rows| rows.iter().filter(|r| r.kind == kind).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn latest_post_date(&self, site_id: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self.content.get(&site_id).and_then(|rows| {
            rows.iter()
                .filter(|r| r.kind == ContentKind::Post)
                .map(|r| r.published_at)
                .max()
        }))
    }

    async fn latest_comment_date(&self, site_id: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self.comment_dates.get(&site_id).map(|d| *d))
    }
}

impl UploadsResolver for InMemoryNetwork {
    fn uploads_path(&self, site_id: u64) -> Option<PathBuf> {
        self.uploads.get(&site_id).map(|p| p.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
