//! Storage report CLI
//!
//! Scans each subdirectory of an uploads root as one site and prints the
//! resulting storage report as JSON. Useful for sizing quotas before
//! wiring the engine into a host.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netdash::network::{build_report, directory_size};

#[derive(Parser, Debug)]
#[command(name = "netdash", about = "Network dashboard storage report", version)]
struct Args {
    /// Uploads root; each subdirectory is treated as one site
    #[arg(long, env = "NETDASH_UPLOADS_ROOT")]
    uploads_root: PathBuf,

    /// Per-site quota in megabytes
    #[arg(long, env = "NETDASH_QUOTA_MB", default_value_t = 1024)]
    quota_mb: u64,

    /// How many of the heaviest sites to report
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Files visited per site before the walk stops
    #[arg(long, default_value_t = 5000)]
    max_files: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "NETDASH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "NETDASH_LOG_JSON")]
    log_json: bool,
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netdash={}", level)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn main() -> netdash::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);

    info!(root = %args.uploads_root.display(), "scanning uploads root");

    let mut usages = Vec::new();
    let mut next_id = 1u64;
    for entry in std::fs::read_dir(&args.uploads_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes = directory_size(&entry.path(), args.max_files);
        debug!(site = %name, bytes, "site scanned");
        usages.push((next_id, name, bytes));
        next_id += 1;
    }

    let report = build_report(usages, args.quota_mb * 1024 * 1024, args.top);
    info!(
        sites = report.sites_scanned,
        total_bytes = report.total_bytes,
        "scan complete"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
