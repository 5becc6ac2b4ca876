//! Background Task Scheduler
//!
//! Fixed registry of recurring maintenance jobs with idempotent scheduling.
//! Job bodies live in [`super::jobs`]; this module owns the registry, the
//! due-time bookkeeping, and the run loop. A failing job is logged and its
//! next run still advances, so one bad pass never wedges the schedule.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::cache::TieredCache;
use crate::network::{ActivityLog, NetworkData, WidgetRegistry};

/// The recurring maintenance jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Snapshot the registered dashboard widgets
    WidgetDetection,
    /// Pre-compute the cheap headline metrics
    CacheWarmup,
    /// Retention purges and store maintenance
    StaleCleanup,
    /// Hit-ratio and memory self-check
    PerformanceCheck,
}

impl Job {
    pub const ALL: [Job; 4] = [
        Job::WidgetDetection,
        Job::CacheWarmup,
        Job::StaleCleanup,
        Job::PerformanceCheck,
    ];

    /// Stable identifier, used as the registry key
    pub fn id(&self) -> &'static str {
        match self {
            Job::WidgetDetection => "netdash_widget_detection",
            Job::CacheWarmup => "netdash_cache_warmup",
            Job::StaleCleanup => "netdash_stale_cleanup",
            Job::PerformanceCheck => "netdash_performance_check",
        }
    }

    /// Recurrence period
    pub fn period(&self) -> Duration {
        match self {
            Job::WidgetDetection => Duration::from_secs(60 * 60),
            Job::CacheWarmup => Duration::from_secs(30 * 60),
            Job::StaleCleanup => Duration::from_secs(24 * 60 * 60),
            Job::PerformanceCheck => Duration::from_secs(60 * 60),
        }
    }
}

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Gate for the performance self-check
    pub monitoring_enabled: bool,
    /// Run-loop tick interval
    pub tick: Duration,
    /// Activity-log retention applied by the cleanup job
    pub activity_log_retention: Duration,
    /// Performance-sample retention applied by the cleanup job
    pub performance_sample_retention: Duration,
    /// Hit ratio (percent) below which the self-check warns
    pub hit_ratio_floor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            tick: Duration::from_secs(60),
            activity_log_retention: Duration::from_secs(30 * 24 * 60 * 60),
            performance_sample_retention: Duration::from_secs(60 * 24 * 60 * 60),
            hit_ratio_floor: 50.0,
        }
    }
}

struct ScheduledJob {
    job: Job,
    next_due: Instant,
}

/// Registry and runner for the recurring jobs
pub struct TaskScheduler {
    pub(super) cache: Arc<TieredCache>,
    pub(super) data: Arc<NetworkData>,
    pub(super) log: Arc<ActivityLog>,
    pub(super) widgets: Arc<dyn WidgetRegistry>,
    pub(super) config: SchedulerConfig,
    registry: Mutex<HashMap<&'static str, ScheduledJob>>,
}

impl TaskScheduler {
    pub fn new(
        cache: Arc<TieredCache>,
        data: Arc<NetworkData>,
        log: Arc<ActivityLog>,
        widgets: Arc<dyn WidgetRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            cache,
            data,
            log,
            widgets,
            config,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Register every job. Safe to call repeatedly: already-registered jobs
    /// keep their existing due times.
    pub fn schedule_all(&self) {
        let mut registry = self.registry.lock();
        for job in Job::ALL {
            if registry.contains_key(job.id()) {
                debug!(job = job.id(), "already scheduled, keeping existing due time");
                continue;
            }
            registry.insert(
                job.id(),
                ScheduledJob {
                    job,
                    next_due: Instant::now() + job.period(),
                },
            );
            info!(job = job.id(), period_secs = job.period().as_secs(), "job scheduled");
        }
    }

    /// Whether a job id is currently registered
    pub fn is_scheduled(&self, id: &str) -> bool {
        self.registry.lock().contains_key(id)
    }

    /// Remove every registered job
    pub fn unschedule_all(&self) {
        let mut registry = self.registry.lock();
        let removed = registry.len();
        registry.clear();
        info!(removed, "all jobs unscheduled");
    }

    /// Execute every job due at `now`, returning how many ran.
    ///
    /// Each due job's next run advances by its period before the body runs,
    /// so a failure cannot stall the schedule.
    pub async fn run_pending(&self, now: Instant) -> usize {
        let due: Vec<Job> = {
            let mut registry = self.registry.lock();
            let mut due = Vec::new();
            for scheduled in registry.values_mut() {
                if scheduled.next_due <= now {
                    due.push(scheduled.job);
                    scheduled.next_due = now + scheduled.job.period();
                }
            }
            due
        };

        for job in &due {
            self.execute(*job).await;
        }
        due.len()
    }

    /// Run one job, swallowing and logging any failure
    pub async fn execute(&self, job: Job) {
        debug!(job = job.id(), "job starting");
        match self.run_job(job).await {
            Ok(()) => debug!(job = job.id(), "job finished"),
            Err(e) => error!(job = job.id(), error = %e, "job failed"),
        }
    }

    /// Tick loop: check for due jobs once per configured interval.
    /// Runs until the surrounding task is dropped.
    pub async fn run(&self) {
        info!(tick_secs = self.config.tick.as_secs(), "scheduler loop starting");
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let ran = self.run_pending(Instant::now()).await;
            if ran > 0 {
                debug!(ran, "scheduler tick executed jobs");
            }
        }
    }

    /// Cache handle (stats, bookkeeping keys)
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Audit log handle
    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    /// Manual trigger for the warm-up job
    pub async fn run_warmup_now(&self) {
        self.execute(Job::CacheWarmup).await;
    }

    /// Manual trigger for the cleanup job
    pub async fn run_cleanup_now(&self) {
        self.execute(Job::StaleCleanup).await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::test_scheduler;

    #[test]
    fn test_job_ids_unique() {
        let mut ids: Vec<&str> = Job::ALL.iter().map(|j| j.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), Job::ALL.len());
    }

    #[test]
    fn test_periods() {
        assert_eq!(Job::WidgetDetection.period(), Duration::from_secs(3600));
        assert_eq!(Job::CacheWarmup.period(), Duration::from_secs(1800));
        assert_eq!(Job::StaleCleanup.period(), Duration::from_secs(86400));
        assert_eq!(Job::PerformanceCheck.period(), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_schedule_all_idempotent() {
        let (scheduler, _network) = test_scheduler();

        scheduler.schedule_all();
        assert!(scheduler.is_scheduled("netdash_cache_warmup"));
        assert!(scheduler.is_scheduled("netdash_widget_detection"));
        assert!(scheduler.is_scheduled("netdash_stale_cleanup"));
        assert!(scheduler.is_scheduled("netdash_performance_check"));

        // Second registration is a no-op.
        scheduler.schedule_all();
        assert!(scheduler.is_scheduled("netdash_cache_warmup"));
    }

    #[tokio::test]
    async fn test_unschedule_all() {
        let (scheduler, _network) = test_scheduler();
        scheduler.schedule_all();
        scheduler.unschedule_all();

        assert!(!scheduler.is_scheduled("netdash_cache_warmup"));
        assert_eq!(scheduler.run_pending(Instant::now() + Duration::from_secs(90000)).await, 0);
    }

    #[tokio::test]
    async fn test_run_pending_respects_due_times() {
        let (scheduler, _network) = test_scheduler();
        scheduler.schedule_all();

        // Nothing is due immediately after scheduling.
        assert_eq!(scheduler.run_pending(Instant::now()).await, 0);

        // Past every period, all four are due.
        let later = Instant::now() + Duration::from_secs(25 * 60 * 60);
        assert_eq!(scheduler.run_pending(later).await, 4);

        // Due times advanced; nothing due again at the same instant.
        assert_eq!(scheduler.run_pending(later).await, 0);
    }
}
