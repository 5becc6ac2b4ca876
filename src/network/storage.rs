//! Per-Site Storage Accounting
//!
//! Bounded directory walks over each site's uploads tree, usage percentage
//! against the network quota, and threshold classification. The walk stops
//! at a hard file cap so one pathological site cannot stall a whole report.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Usage classification against the network quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Good,
    Warning,
    Critical,
}

impl StorageStatus {
    /// Classify a usage percentage. Boundaries are exclusive: exactly 90
    /// is warning, exactly 75 is good.
    pub fn classify(usage_pct: f64) -> Self {
        if usage_pct > 90.0 {
            StorageStatus::Critical
        } else if usage_pct > 75.0 {
            StorageStatus::Warning
        } else {
            StorageStatus::Good
        }
    }
}

/// One site's storage figures within a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStorageRecord {
    pub site_id: u64,
    pub site_name: String,
    pub bytes_used: u64,
    /// Usage as a percentage of the quota, rounded to two decimals
    pub usage_percentage: f64,
    pub status: StorageStatus,
}

/// Network-wide storage report: the heaviest sites plus totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageReport {
    /// Heaviest sites, descending by bytes used, truncated to the requested limit
    pub sites: Vec<SiteStorageRecord>,
    /// Total bytes over every scanned site, including ones below the cut
    pub total_bytes: u64,
    /// Mean bytes per scanned site
    pub average_bytes: u64,
    /// Bytes used by the heaviest site
    pub largest_bytes: u64,
    /// Number of sites scanned
    pub sites_scanned: usize,
    /// Per-site quota the percentages are computed against, in bytes
    pub quota_bytes: u64,
}

/// Usage percentage of `bytes` against `quota_bytes`, two-decimal rounded.
/// A zero quota reads as 0% rather than dividing by zero.
pub fn usage_percentage(bytes: u64, quota_bytes: u64) -> f64 {
    if quota_bytes == 0 {
        return 0.0;
    }
    let pct = bytes as f64 / quota_bytes as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Sum file sizes under `root`, visiting at most `file_cap` files.
///
/// Unreadable entries are skipped with a debug log; an unreadable or missing
/// root counts as zero bytes. Hitting the cap logs a warning and returns the
/// partial sum.
pub fn directory_size(root: &Path, file_cap: usize) -> u64 {
    if !root.is_dir() {
        debug!(path = %root.display(), "uploads path missing, counting zero bytes");
        return 0;
    }

    let mut total = 0u64;
    let mut files = 0usize;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(path = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if files >= file_cap {
            warn!(
                path = %root.display(),
                file_cap,
                "file cap reached, reporting partial directory size"
            );
            break;
        }
        files += 1;
        match entry.metadata() {
            Ok(meta) => total = total.saturating_add(meta.len()),
            Err(err) => {
                debug!(path = %entry.path().display(), error = %err, "skipping unreadable file");
            }
        }
    }
    total
}

/// Build a report from per-site byte counts: sort descending, classify
/// against the quota, keep the top `limit`, and compute totals over every
/// scanned site.
pub fn build_report(
    mut usages: Vec<(u64, String, u64)>,
    quota_bytes: u64,
    limit: usize,
) -> StorageReport {
    let sites_scanned = usages.len();
    let total_bytes: u64 = usages.iter().map(|(_, _, b)| b).sum();
    let largest_bytes = usages.iter().map(|(_, _, b)| *b).max().unwrap_or(0);
    let average_bytes = if sites_scanned == 0 {
        0
    } else {
        total_bytes / sites_scanned as u64
    };

    usages.sort_by(|a, b| b.2.cmp(&a.2));
    usages.truncate(limit);

    let sites = usages
        .into_iter()
        .map(|(site_id, site_name, bytes_used)| {
            let usage_percentage = usage_percentage(bytes_used, quota_bytes);
            SiteStorageRecord {
                site_id,
                site_name,
                bytes_used,
                usage_percentage,
                status: StorageStatus::classify(usage_percentage),
            }
        })
        .collect();

    StorageReport {
        sites,
        total_bytes,
        average_bytes,
        largest_bytes,
        sites_scanned,
        quota_bytes,
    }
}

// =============================================================================
// Tests
// =============================================================================
