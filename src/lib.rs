//! reposync - resource management for long-running repository synchronization
//!
//! This crate re-exports the primitives from `reposync-core` and adds
//! [`session::MonitoredPass`] for bracketing a synchronization pass with
//! memory-pressure monitoring.
//!
//! # Examples
//!
//! ```no_run
//! use reposync::{MonitoredPass, PressureMonitor, StringIntern, Thresholds};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let monitor = PressureMonitor::with_logging(Thresholds::default());
//!     let names = StringIntern::new();
//!
//!     let pass = MonitoredPass::begin(&monitor, "sync", Duration::from_secs(30));
//!     let owner = names.intern("octocat");
//!     assert_eq!(&*owner, "octocat");
//!     let summary = pass.finish();
//!     println!("{} alerts", summary.alerts);
//! }
//! ```

pub mod session;

pub use reposync_core::{
    config, counters, error, lazy_loader, memory_monitor, string_pool,
};

// Re-export commonly used types
pub use reposync_core::{
    Alert, AlertCallback, AlertType, InternStats, LazyLoader, MemorySampler, MemoryStats,
    MonitorConfig, MonitorStats, PressureMonitor, ProcessSampler, ResourceError, Result, Severity,
    StringIntern, Thresholds, log_alert,
};
pub use session::{MonitoredPass, PassSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
