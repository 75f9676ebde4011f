//! Memory-pressure monitoring
//!
//! [`PressureMonitor`] samples process memory on a fixed interval from a single
//! background task, compares the sample against [`Thresholds`], and hands an
//! [`Alert`] to the caller's callback for every exceeded threshold. Reading
//! process statistics and delivering each alert both happen on tokio's
//! blocking pool, so neither a slow platform read nor a slow callback holds an
//! async worker. Alert delivery order is not guaranteed.
//!
//! The monitor only observes. It never frees or evicts application data.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use sysinfo::{Pid, System};
use tokio::{
    runtime::Handle,
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use crate::config::Thresholds;
use crate::counters::Counter;

/// Shortest sampling interval accepted by [`PressureMonitor::start_monitoring`]
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Ratio of observed to threshold at which an alert becomes critical
const CRITICAL_RATIO: f64 = 2.0;
/// Ratio of observed to threshold at which an alert becomes a warning
const WARNING_RATIO: f64 = 1.5;

/// Callback receiving alerts; invoked on tokio's blocking pool
pub type AlertCallback = Arc<dyn Fn(Alert) + Send + Sync>;

/// How far an observed value exceeds its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Classify an `observed / threshold` ratio
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= CRITICAL_RATIO {
            Severity::Critical
        } else if ratio >= WARNING_RATIO {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    /// Classify an observed value against its threshold
    pub fn classify(observed: u64, threshold: u64) -> Self {
        Self::from_ratio(observed as f64 / threshold as f64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which threshold an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HeapAlloc,
    HeapSys,
    TaskCount,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HeapAlloc => "heap_alloc",
            AlertType::HeapSys => "heap_sys",
            AlertType::TaskCount => "task_count",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time memory statistics of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Bytes in use by the process (resident set size)
    pub heap_alloc_bytes: u64,
    /// Bytes reserved from the OS (virtual size)
    pub heap_sys_bytes: u64,
    /// Alive tasks in the current async runtime
    pub task_count: u64,
    pub sampled_at: DateTime<Utc>,
}

/// A threshold violation observed during one sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub stats: MemoryStats,
    pub severity: Severity,
    pub observed: u64,
    pub threshold: u64,
}

impl Alert {
    fn new(alert_type: AlertType, observed: u64, threshold: u64, stats: MemoryStats) -> Self {
        let message = match alert_type {
            AlertType::HeapAlloc => format!(
                "Heap allocation {} exceeds threshold {}",
                format_bytes(observed),
                format_bytes(threshold)
            ),
            AlertType::HeapSys => format!(
                "Heap system memory {} exceeds threshold {}",
                format_bytes(observed),
                format_bytes(threshold)
            ),
            AlertType::TaskCount => {
                format!("Task count {observed} exceeds threshold {threshold}")
            }
        };

        Self {
            alert_type,
            message,
            timestamp: Utc::now(),
            stats,
            severity: Severity::classify(observed, threshold),
            observed,
            threshold,
        }
    }
}

/// Live monitor counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub alert_count: u64,
    /// Alerts with severity `Warning` or above
    pub high_pressure_events: u64,
    pub gc_forced_count: u64,
    pub monitoring_enabled: bool,
    /// Sampling ticks processed since construction
    pub samples_taken: u64,
}

/// Source of memory statistics
pub trait MemorySampler: Send + Sync {
    /// Take a sample. Sampling is best-effort and never fails.
    fn sample(&self) -> MemoryStats;
}

/// Samples the current process through `sysinfo` and the tokio runtime
pub struct ProcessSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Could not determine current pid, memory will read as 0: {}", e);
                None
            }
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl MemorySampler for ProcessSampler {
    fn sample(&self) -> MemoryStats {
        let (resident, virtual_size) = self
            .pid
            .and_then(|pid| {
                let mut system = self.system.lock();
                if !system.refresh_process(pid) {
                    return None;
                }
                system
                    .process(pid)
                    .map(|process| (process.memory(), process.virtual_memory()))
            })
            .unwrap_or((0, 0));

        let task_count = Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks() as u64)
            .unwrap_or(0);

        MemoryStats {
            heap_alloc_bytes: resident,
            heap_sys_bytes: virtual_size,
            task_count,
            sampled_at: Utc::now(),
        }
    }
}

/// Route an alert into the tracing pipeline at a level matching its severity
pub fn log_alert(alert: &Alert) {
    match alert.severity {
        Severity::Info => info!(
            alert_type = %alert.alert_type,
            observed = alert.observed,
            threshold = alert.threshold,
            "{}",
            alert.message
        ),
        Severity::Warning => warn!(
            alert_type = %alert.alert_type,
            observed = alert.observed,
            threshold = alert.threshold,
            "{}",
            alert.message
        ),
        Severity::Critical => error!(
            alert_type = %alert.alert_type,
            observed = alert.observed,
            threshold = alert.threshold,
            "{}",
            alert.message
        ),
    }
}

#[derive(Default)]
struct MonitorState {
    last_stats: Option<MemoryStats>,
    enabled: bool,
    shutdown: Option<watch::Sender<bool>>,
    /// Bumped on every start so a stale loop cannot clear a newer one
    generation: u64,
}

struct MonitorInner {
    thresholds: Thresholds,
    sampler: Arc<dyn MemorySampler>,
    callback: Option<AlertCallback>,
    state: RwLock<MonitorState>,
    alert_count: Counter,
    high_pressure_events: Counter,
    gc_forced_count: Counter,
    samples_taken: Counter,
}

/// Periodic memory-pressure monitor
///
/// Dropping the monitor stops its sampling task.
pub struct PressureMonitor {
    inner: Arc<MonitorInner>,
}

impl PressureMonitor {
    /// Create a monitor sampling the current process
    ///
    /// A `None` callback is allowed: counters still update but no alert is
    /// delivered.
    pub fn new(thresholds: Thresholds, callback: Option<AlertCallback>) -> Self {
        Self::with_sampler(thresholds, callback, Arc::new(ProcessSampler::new()))
    }

    /// Create a monitor whose alerts are written to the tracing log
    pub fn with_logging(thresholds: Thresholds) -> Self {
        Self::new(thresholds, Some(Arc::new(|alert: Alert| log_alert(&alert))))
    }

    /// Create a monitor reading statistics from a custom sampler
    pub fn with_sampler(
        thresholds: Thresholds,
        callback: Option<AlertCallback>,
        sampler: Arc<dyn MemorySampler>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                thresholds,
                sampler,
                callback,
                state: RwLock::new(MonitorState::default()),
                alert_count: Counter::new(),
                high_pressure_events: Counter::new(),
                gc_forced_count: Counter::new(),
                samples_taken: Counter::new(),
            }),
        }
    }

    /// Start sampling every `interval` on a background task
    ///
    /// Does nothing if the monitor is already running. Must be called from
    /// within a tokio runtime; otherwise a warning is logged and the monitor
    /// stays idle.
    pub fn start_monitoring(&self, interval: Duration) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Memory pressure monitor needs a tokio runtime: {}", e);
                return;
            }
        };

        let mut state = self.inner.state.write();
        if state.enabled {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        state.shutdown = Some(shutdown_tx);
        state.enabled = true;
        state.generation += 1;
        let exit = LoopExitGuard {
            inner: Arc::clone(&self.inner),
            generation: state.generation,
        };

        let interval = interval.max(MIN_INTERVAL);
        handle.spawn(run_sampling_loop(exit, interval, shutdown_rx));
        debug!("Memory pressure monitor started ({:?} interval)", interval);
    }

    /// Signal the background task to stop
    ///
    /// Returns as soon as the signal is raised without waiting for the task to
    /// exit. Does nothing if the monitor is idle. The monitor can be started
    /// again afterwards.
    pub fn stop_monitoring(&self) {
        let mut state = self.inner.state.write();
        if !state.enabled {
            return;
        }

        state.enabled = false;
        if let Some(shutdown) = state.shutdown.take() {
            let _ = shutdown.send(true);
        }
        debug!("Memory pressure monitor stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.state.read().enabled
    }

    /// Manual collection escape hatch
    ///
    /// Memory is released deterministically in Rust, so there is no collector
    /// to run. This records the request, takes a fresh sample, stores it as
    /// the latest snapshot and returns it. It is never called automatically.
    pub fn force_gc(&self) -> MemoryStats {
        self.inner.gc_forced_count.incr();
        let stats = self.inner.sampler.sample();
        self.inner.state.write().last_stats = Some(stats);
        debug!(
            "Forced collection requested, heap_alloc={} heap_sys={}",
            format_bytes(stats.heap_alloc_bytes),
            format_bytes(stats.heap_sys_bytes)
        );
        stats
    }

    /// Counters readable while the monitor runs
    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            alert_count: self.inner.alert_count.get(),
            high_pressure_events: self.inner.high_pressure_events.get(),
            gc_forced_count: self.inner.gc_forced_count.get(),
            monitoring_enabled: self.inner.state.read().enabled,
            samples_taken: self.inner.samples_taken.get(),
        }
    }

    /// The most recent sample, if any tick or forced collection has run
    pub fn last_stats(&self) -> Option<MemoryStats> {
        self.inner.state.read().last_stats
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.inner.thresholds
    }
}

impl Drop for PressureMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// Returns the monitor to idle when its sampling task ends
///
/// Runs on a normal loop exit and also when the task is dropped because its
/// runtime shut down.
struct LoopExitGuard {
    inner: Arc<MonitorInner>,
    generation: u64,
}

impl Drop for LoopExitGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.write();
        if state.enabled && state.generation == self.generation {
            state.enabled = false;
            state.shutdown = None;
            debug!("Memory pressure monitor task ended without a stop request");
        }
    }
}

async fn run_sampling_loop(
    exit: LoopExitGuard,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let inner = Arc::clone(&exit.inner);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            // Err means the sender was dropped, which also ends the loop
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                // Reading process statistics touches the filesystem
                let sampler = Arc::clone(&inner.sampler);
                let stats = match tokio::task::spawn_blocking(move || sampler.sample()).await {
                    Ok(stats) => stats,
                    Err(e) => {
                        warn!("Memory sampling task failed: {}", e);
                        continue;
                    }
                };
                // A stop raised while sampling discards the sample
                if shutdown.has_changed().unwrap_or(true) {
                    break;
                }
                inner.check_memory(stats);
            }
        }
    }

    drop(exit);
}

impl MonitorInner {
    /// One sampling tick: store, compare, dispatch
    fn check_memory(&self, stats: MemoryStats) {
        self.samples_taken.incr();
        self.state.write().last_stats = Some(stats);

        let checks = [
            (
                AlertType::HeapAlloc,
                stats.heap_alloc_bytes,
                self.thresholds.heap_alloc_bytes,
            ),
            (
                AlertType::HeapSys,
                stats.heap_sys_bytes,
                self.thresholds.heap_sys_bytes,
            ),
            (
                AlertType::TaskCount,
                stats.task_count,
                self.thresholds.max_tasks,
            ),
        ];

        for (alert_type, observed, threshold) in checks {
            if observed > threshold {
                self.dispatch(Alert::new(alert_type, observed, threshold, stats));
            }
        }
    }

    fn dispatch(&self, alert: Alert) {
        self.alert_count.incr();
        if alert.severity >= Severity::Warning {
            self.high_pressure_events.incr();
        }

        let Some(callback) = self.callback.clone() else {
            return;
        };

        // Callbacks are synchronous and may block, keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let alert_type = alert.alert_type;
            if panic::catch_unwind(AssertUnwindSafe(|| callback(alert))).is_err() {
                error!(%alert_type, "Alert callback panicked");
            }
        });
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GB {
        format!("{:.1} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.1} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
