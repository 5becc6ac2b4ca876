//! Memory limit probe and usage monitoring
//!
//! Parses human-readable memory limits ("256M", "-1") and samples process
//! memory so the cache manager can decide whether in-process caching is safe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

use super::{MEMORY_PRESSURE_THRESHOLD, MEMORY_RESERVE_FRACTION};

/// Parse a human memory-limit string into a byte count.
///
/// `"-1"` means unlimited and yields `None`. Suffixes `K`, `M`, `G` are
/// accepted case-insensitively; a bare number is taken as bytes.
pub fn parse_memory_limit(raw: &str) -> Result<Option<u64>> {
    let trimmed = raw.trim();
    if trimmed == "-1" {
        return Ok(None);
    }
    if trimmed.is_empty() {
        return Err(Error::MemoryLimitParse(raw.to_string()));
    }

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1024u64),
        Some('m') | Some('M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed, 1),
    };

    let count: u64 = digits
        .parse()
        .map_err(|_| Error::MemoryLimitParse(raw.to_string()))?;

    count
        .checked_mul(multiplier)
        .map(Some)
        .ok_or_else(|| Error::MemoryLimitParse(raw.to_string()))
}

/// Source of current process memory usage, in bytes
pub trait MemorySampler: Send + Sync {
    /// Sample current usage
    fn current_usage(&self) -> u64;
}

/// Sampler reading resident set size from `/proc/self/statm`
///
/// Returns 0 on platforms without procfs, which disables all pressure checks.
#[derive(Debug, Default)]
pub struct ProcStatmSampler;

impl ProcStatmSampler {
    pub fn new() -> Self {
        Self
    }
}

impl MemorySampler for ProcStatmSampler {
    #[cfg(target_os = "linux")]
    fn current_usage(&self) -> u64 {
        // statm reports pages; the second field is resident set size
        const PAGE_SIZE: u64 = 4096;
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| {
                s.split_whitespace()
                    .nth(1)
                    .and_then(|pages| pages.parse::<u64>().ok())
            })
            .map(|pages| pages * PAGE_SIZE)
            .unwrap_or(0)
    }

    #[cfg(not(target_os = "linux"))]
    fn current_usage(&self) -> u64 {
        0
    }
}

/// Fixed-value sampler for tests and manual wiring
#[derive(Debug, Default)]
pub struct FixedSampler {
    usage: AtomicU64,
}

impl FixedSampler {
    pub fn new(usage: u64) -> Self {
        Self {
            usage: AtomicU64::new(usage),
        }
    }

    pub fn set(&self, usage: u64) {
        self.usage.store(usage, Ordering::Relaxed);
    }
}

impl MemorySampler for FixedSampler {
    fn current_usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }
}

/// Memory monitor combining a configured ceiling with a usage sampler
pub struct MemoryMonitor {
    /// Configured ceiling in bytes; `None` means unlimited
    ceiling: Option<u64>,
    /// Usage sampler
    sampler: Arc<dyn MemorySampler>,
    /// Peak observed usage
    peak: AtomicU64,
}

impl MemoryMonitor {
    /// Create a monitor with the given ceiling and sampler
    pub fn new(ceiling: Option<u64>, sampler: Arc<dyn MemorySampler>) -> Self {
        Self {
            ceiling,
            sampler,
            peak: AtomicU64::new(0),
        }
    }

    /// Monitor with no ceiling - all checks pass, nothing ever trips
    pub fn unlimited() -> Self {
        Self::new(None, Arc::new(ProcStatmSampler::new()))
    }

    /// Monitor with a ceiling parsed from a human limit string
    pub fn from_limit(limit: &str) -> Result<Self> {
        Ok(Self::new(
            parse_memory_limit(limit)?,
            Arc::new(ProcStatmSampler::new()),
        ))
    }

    /// Sample current usage and track the peak
    pub fn usage(&self) -> u64 {
        let usage = self.sampler.current_usage();
        self.peak.fetch_max(usage, Ordering::Relaxed);
        usage
    }

    /// Peak observed usage
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    /// Configured ceiling
    pub fn ceiling(&self) -> Option<u64> {
        self.ceiling
    }

    /// Whether enough headroom remains for an in-process cache write.
    ///
    /// Re-sampled on every call - never cached.
    pub fn headroom_ok(&self) -> bool {
        match self.ceiling {
            None => true,
            Some(ceiling) => {
                let available = ceiling.saturating_sub(self.usage());
                available as f64 > MEMORY_RESERVE_FRACTION * ceiling as f64
            }
        }
    }

    /// Whether usage has crossed the pressure threshold (circuit breaker)
    pub fn over_pressure(&self) -> bool {
        match self.ceiling {
            None => false,
            Some(ceiling) => self.usage() as f64 > MEMORY_PRESSURE_THRESHOLD * ceiling as f64,
        }
    }

    /// Byte budget reserved for the process tier's resident set
    pub fn process_budget(&self) -> Option<u64> {
        self.ceiling
            .map(|c| (c as f64 * MEMORY_RESERVE_FRACTION) as u64)
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("ceiling", &self.ceiling)
            .field("peak", &self.peak())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
