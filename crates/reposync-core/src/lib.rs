//! Resource-management primitives for reposync
//!
//! This crate bounds memory growth during long-running synchronization passes:
//! - [`string_pool`]: a bounded string-interning cache for repeated identifiers
//! - [`lazy_loader`]: deferred, at-most-once-per-epoch construction of expensive values
//! - [`memory_monitor`]: periodic memory-pressure sampling with asynchronous alerts
//!
//! All three share the lock-free counters in [`counters`].

pub mod config;
pub mod counters;
pub mod error;
pub mod lazy_loader;
pub mod memory_monitor;
pub mod string_pool;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use config::{MonitorConfig, Thresholds};
pub use error::{ResourceError, Result};
pub use lazy_loader::LazyLoader;
pub use memory_monitor::{
    Alert, AlertCallback, AlertType, MemorySampler, MemoryStats, MonitorStats, PressureMonitor,
    ProcessSampler, Severity, log_alert,
};
pub use string_pool::{InternStats, StringIntern};
