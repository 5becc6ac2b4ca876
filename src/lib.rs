//! # netdash
//!
//! Data engine for a network-admin dashboard: tiered caching, cross-site
//! metric aggregation, and background refresh.
//!
//! ## Components
//!
//! - **Tiered cache** ([`cache`]): in-process, shared object-cache, and
//!   durable transient tiers behind one manager, with read-through backfill,
//!   write-through fan-out, and a memory-aware process tier.
//! - **Network data** ([`network`]): batched cross-site content counts,
//!   storage accounting with bounded walks, activity sampling, settings and
//!   status snapshots. One broken site never blanks a widget.
//! - **Background tasks** ([`tasks`]): widget detection, cache warm-up,
//!   stale cleanup, and a performance self-check on fixed schedules.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use netdash::cache::{MemoryMonitor, TieredCache};
//! use netdash::network::{AggregatorConfig, InMemoryNetwork, NetworkData};
//!
//! # async fn example() -> netdash::Result<()> {
//! let network = Arc::new(InMemoryNetwork::new());
//! let cache = Arc::new(TieredCache::in_memory());
//! let data = NetworkData::new(
//!     cache,
//!     network.clone(),
//!     network.clone(),
//!     network,
//!     Arc::new(MemoryMonitor::unlimited()),
//!     AggregatorConfig::default(),
//! );
//!
//! let sites = data.total_sites().await?;
//! println!("{} sites", sites);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod network;
pub mod tasks;

pub use error::{Error, Result};
