//! Monitor and cache configuration
//!
//! Thresholds are immutable once handed to a
//! [`PressureMonitor`](crate::memory_monitor::PressureMonitor). Values can be
//! deserialized from the host tool's configuration file or overlaid from
//! environment variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::{ResourceError, Result};
use crate::string_pool::DEFAULT_MAX_SIZE;

const MB: u64 = 1024 * 1024;

/// Default heap-allocated threshold (100 MB)
pub const DEFAULT_HEAP_ALLOC_BYTES: u64 = 100 * MB;
/// Default heap-system threshold (200 MB)
pub const DEFAULT_HEAP_SYS_BYTES: u64 = 200 * MB;
/// Default collector target percentage
pub const DEFAULT_GC_PERCENT: u32 = 10;
/// Default concurrent task ceiling
pub const DEFAULT_MAX_TASKS: u64 = 1000;
/// Default sampling interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

/// Memory-pressure thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Allocated heap bytes before a `heap_alloc` alert fires
    pub heap_alloc_bytes: u64,
    /// Bytes reserved from the OS before a `heap_sys` alert fires
    pub heap_sys_bytes: u64,
    /// Collector target percentage. Kept for configuration compatibility with
    /// collected runtimes; it is not checked per tick.
    pub gc_percent: u32,
    /// Alive async tasks before a `task_count` alert fires
    pub max_tasks: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            heap_alloc_bytes: DEFAULT_HEAP_ALLOC_BYTES,
            heap_sys_bytes: DEFAULT_HEAP_SYS_BYTES,
            gc_percent: DEFAULT_GC_PERCENT,
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }
}

/// Configuration for a monitored synchronization pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,
    pub thresholds: Thresholds,
    /// Bound for the string pool, `0` means unbounded
    pub intern_max_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            thresholds: Thresholds::default(),
            intern_max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl MonitorConfig {
    /// Build a configuration from defaults overlaid with environment variables
    ///
    /// Recognised variables: `REPOSYNC_SAMPLE_INTERVAL_MS`,
    /// `REPOSYNC_HEAP_ALLOC_MB`, `REPOSYNC_HEAP_SYS_MB`, `REPOSYNC_GC_PERCENT`,
    /// `REPOSYNC_MAX_TASKS` and `REPOSYNC_INTERN_MAX_SIZE`. Unset variables
    /// keep their defaults; unparseable ones are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = env_value::<u64>("REPOSYNC_SAMPLE_INTERVAL_MS")? {
            config.interval_ms = ms;
        }
        if let Some(mb) = env_value::<u64>("REPOSYNC_HEAP_ALLOC_MB")? {
            config.thresholds.heap_alloc_bytes = megabytes(mb);
        }
        if let Some(mb) = env_value::<u64>("REPOSYNC_HEAP_SYS_MB")? {
            config.thresholds.heap_sys_bytes = megabytes(mb);
        }
        if let Some(percent) = env_value::<u32>("REPOSYNC_GC_PERCENT")? {
            config.thresholds.gc_percent = percent;
        }
        if let Some(tasks) = env_value::<u64>("REPOSYNC_MAX_TASKS")? {
            config.thresholds.max_tasks = tasks;
        }
        if let Some(size) = env_value::<usize>("REPOSYNC_INTERN_MAX_SIZE")? {
            config.intern_max_size = size;
        }

        Ok(config)
    }

    /// Sampling interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Convert megabytes to bytes, saturating at `u64::MAX`
pub fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(MB)
}

fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => {
            let value = raw.trim().parse::<T>().map_err(|e| {
                ResourceError::InvalidConfig(format!("{key}='{raw}': {e}"))
            })?;
            debug!("Using {} from environment: {}", key, raw.trim());
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}
