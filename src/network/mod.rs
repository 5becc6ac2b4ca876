//! Network Data Layer
//!
//! Cross-site aggregation for the dashboard: provider traits the host
//! implements, storage accounting with bounded walks, activity sampling,
//! and the [`NetworkData`] aggregator that puts the tiered cache in front
//! of all of it. Every aggregate degrades per-site failures to zero or
//! empty contributions.

mod activity;
mod aggregator;
mod log;
mod provider;
mod storage;

pub use activity::{
    relative_time, trim_excerpt, ActivityStatus, NetworkActivityRecord, SiteActivityRecord,
};
pub use aggregator::{
    AggregatorConfig, MultisiteConfiguration, NetworkData, NetworkInformation, NetworkStatus,
};
pub use log::{ActivityLog, LogEntry};
pub use provider::{
    ContentKind, ContentRecord, ContentStore, InMemoryNetwork, NetworkSettings, SiteDirectory,
    SiteInfo, StaticWidgetRegistry, UploadsResolver, WidgetRegistry,
};
pub use storage::{
    build_report, directory_size, usage_percentage, SiteStorageRecord, StorageReport,
    StorageStatus,
};

use crate::cache::fingerprint;

/// Cache group all aggregates live under
pub const CACHE_GROUP: &str = "network_data";

/// Hard cap on sites considered by network-wide counts
pub const MAX_AGGREGATE_SITES: usize = 1000;

/// Sites counted per batch between memory-pressure checks
pub const COUNT_BATCH_SIZE: usize = 50;

/// Hard cap on sites scanned for storage reports
pub const STORAGE_SITE_LIMIT: usize = 100;

/// Files visited per site before a storage walk stops
pub const STORAGE_FILE_CAP: usize = 5000;

/// Recently-updated sites sampled for the activity feed
pub const ACTIVITY_SAMPLE_SITES: usize = 5;

/// Posts taken from each sampled site
pub const ACTIVITY_POSTS_PER_SITE: usize = 3;

/// Pages taken from each sampled site
pub const ACTIVITY_PAGES_PER_SITE: usize = 2;

/// Character cap on activity-feed excerpts
pub const EXCERPT_MAX_CHARS: usize = 120;

/// Fingerprint for a limit-parameterized query (micro-cache key)
pub(crate) fn query_key(name: &str, limit: usize) -> u64 {
    fingerprint(&format!("{}:{}", name, limit))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_are_sane() {
        assert!(COUNT_BATCH_SIZE <= MAX_AGGREGATE_SITES);
        assert!(STORAGE_SITE_LIMIT <= MAX_AGGREGATE_SITES);
        assert!(ACTIVITY_POSTS_PER_SITE + ACTIVITY_PAGES_PER_SITE > 0);
    }

    #[test]
    fn test_query_key_separates_limits() {
        assert_ne!(query_key("active_sites", 10), query_key("active_sites", 20));
        assert_ne!(query_key("active_sites", 10), query_key("storage", 10));
    }
}
