//! Tiered Cache System
//!
//! Three-layer caching for expensive network-wide queries: an in-process map
//! scoped to one request, an optional shared object cache, and a durable
//! transient store.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         Tiered Cache Manager                          │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │  Process (request)    │ Object Cache (shared)  │ Transient (durable)  │
//! │  ┌────────────────┐   │ ┌────────────────┐     │ ┌────────────────┐   │
//! │  │ DashMap        │   │ │ Optional,      │     │ │ Key/value rows │   │
//! │  │ TTL ≤ short    │   │ │ probed once at │     │ │ with expiry    │   │
//! │  │ 20% mem budget │   │ │ construction   │     │ │ metadata       │   │
//! │  └────────────────┘   │ └────────────────┘     │ └────────────────┘   │
//! │         │             │         │              │         │            │
//! │         └─────────────┴─────────┴──────────────┴─────────┘            │
//! │                              │                                        │
//! │            Read-through backfill / write-through fan-out              │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Semantics
//!
//! - Reads fall through fastest-to-slowest; hits backfill the cheaper tiers.
//! - Writes fan out to every tier; the process tier clamps any requested TTL
//!   to [`TTL_SHORT`] and is skipped entirely when memory headroom is gone.
//! - Tier failures are swallowed: a broken tier reads as a miss and writes
//!   best-effort. Cache misses are never errors.

mod entry;
mod manager;
mod memory;
mod object;
mod process;
mod query;
mod transient;

pub use entry::{derive_key, estimated_size};
pub use manager::{CacheStats, PerformanceStats, TieredCache};
pub use memory::{
    parse_memory_limit, FixedSampler, MemoryMonitor, MemorySampler, ProcStatmSampler,
};
pub use object::{InMemoryObjectCache, ObjectCache};
pub use process::ProcessCache;
pub use query::{fingerprint, QueryCache};
pub use transient::{InMemoryTransientStore, TransientStore};

use std::time::Duration;

/// Namespace prefix prepended to every derived cache key
pub const KEY_PREFIX: &str = "netdash";

/// Short TTL (5 minutes) - also the hard ceiling for the process tier
pub const TTL_SHORT: Duration = Duration::from_secs(5 * 60);

/// Medium TTL (30 minutes) - default for most cached aggregates
pub const TTL_MEDIUM: Duration = Duration::from_secs(30 * 60);

/// Long TTL (1 hour)
pub const TTL_LONG: Duration = Duration::from_secs(60 * 60);

/// Extended TTL (24 hours) - near-static data only
pub const TTL_EXTENDED: Duration = Duration::from_secs(24 * 60 * 60);

/// Fraction of the memory ceiling kept free; process-tier writes stop when
/// sampled headroom drops below this, and the tier's resident bytes are
/// bounded by the same fraction of the ceiling
pub const MEMORY_RESERVE_FRACTION: f64 = 0.20;

/// Memory usage fraction above which the circuit breaker and the
/// performance self-check trip
pub const MEMORY_PRESSURE_THRESHOLD: f64 = 0.80;

/// Maximum entries held by the per-request query micro-cache
pub const QUERY_CACHE_CAPACITY: usize = 100;

// =============================================================================
// Tests
// =============================================================================
