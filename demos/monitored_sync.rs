//! Simulates a synchronization pass under memory-pressure monitoring
//!
//! Run with `cargo run --example monitored_sync -- --heap-alloc-mb 1`.
//! Alerts are routed into the tracing log.

use clap::Parser;
use reposync::config::megabytes;
use reposync::{LazyLoader, MonitorConfig, MonitoredPass, PressureMonitor, StringIntern};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Run a simulated sync pass with memory monitoring")]
struct Args {
    /// Sampling interval in milliseconds
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Heap-allocated threshold in MB (overrides REPOSYNC_HEAP_ALLOC_MB)
    #[arg(long)]
    heap_alloc_mb: Option<u64>,

    /// Number of simulated API records to decode
    #[arg(long, default_value_t = 200_000)]
    records: usize,

    /// Suppress informational output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The --quiet flag should override RUST_LOG
    let filter = if args.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("reposync=info,reposync_core=info,monitored_sync=info")
        })
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = MonitorConfig::from_env()?;
    if let Some(mb) = args.heap_alloc_mb {
        config.thresholds.heap_alloc_bytes = megabytes(mb);
    }

    let monitor = PressureMonitor::with_logging(config.thresholds);
    let names = StringIntern::with_size(config.intern_max_size);
    let owners: LazyLoader<Arc<Vec<String>>> = LazyLoader::new(|| {
        Ok(Arc::new((0..50).map(|i| format!("owner-{i}")).collect()))
    });

    let pass = MonitoredPass::begin(
        &monitor,
        "simulated sync",
        Duration::from_millis(args.interval_ms),
    );

    let owners = owners.get()?;
    let mut decoded = Vec::with_capacity(args.records);
    for i in 0..args.records {
        let owner = names.intern(&owners[i % owners.len()]);
        let path = names.intern(&format!("src/module_{}.rs", i % 5_000));
        decoded.push((owner, path));
        if i % 50_000 == 0 {
            tokio::task::yield_now().await;
        }
    }
    tokio::time::sleep(Duration::from_millis(args.interval_ms * 3)).await;

    let summary = pass.finish();
    let intern_stats = names.stats();
    info!(
        "Decoded {} records: {} unique strings, {} hits, {} evicted, {} alerts in {:?}",
        decoded.len(),
        intern_stats.size,
        intern_stats.hits,
        intern_stats.evicted,
        summary.alerts,
        summary.elapsed
    );

    Ok(())
}
