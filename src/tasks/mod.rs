//! Background Maintenance
//!
//! Recurring jobs that keep the dashboard fast and the durable store tidy:
//! widget detection, cache warm-up, stale cleanup, and a performance
//! self-check. Scheduling is idempotent and job failures never escape a run.

mod jobs;
mod scheduler;

pub use scheduler::{Job, SchedulerConfig, TaskScheduler};

/// Cache group for job bookkeeping keys
pub const TASKS_GROUP: &str = "background_tasks";

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::cache::{MemoryMonitor, TieredCache};
    use crate::network::{
        ActivityLog, AggregatorConfig, ContentStore, InMemoryNetwork, NetworkData, SiteDirectory,
        StaticWidgetRegistry, UploadsResolver,
    };

    use super::{SchedulerConfig, TaskScheduler};

    /// Scheduler over an in-memory network with one seeded site
    pub fn test_scheduler() -> (TaskScheduler, Arc<InMemoryNetwork>) {
        let network = Arc::new(InMemoryNetwork::new());
        network.add_site(crate::network::SiteInfo {
            id: 1,
            name: "Site 1".to_string(),
            domain: "site1.example.com".to_string(),
            path: "/".to_string(),
            last_updated: chrono::Utc::now(),
            registered: chrono::Utc::now(),
        });
        network.set_total_users(3);

        let cache = Arc::new(TieredCache::in_memory());
        let data = Arc::new(NetworkData::new(
            Arc::clone(&cache),
            Arc::clone(&network) as Arc<dyn SiteDirectory>,
            Arc::clone(&network) as Arc<dyn ContentStore>,
            Arc::clone(&network) as Arc<dyn UploadsResolver>,
            Arc::new(MemoryMonitor::unlimited()),
            AggregatorConfig::default(),
        ));
        let log = Arc::new(ActivityLog::new(Arc::clone(cache.store())));
        let widgets = Arc::new(StaticWidgetRegistry::new(vec![
            "network_overview".to_string(),
            "storage_data".to_string(),
            "recent_activity".to_string(),
            "active_sites".to_string(),
        ]));

        let scheduler = TaskScheduler::new(cache, data, log, widgets, SchedulerConfig::default());
        (scheduler, network)
    }
}
