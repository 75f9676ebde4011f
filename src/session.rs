//! Bracketing a synchronization pass with memory-pressure monitoring
//!
//! A [`MonitoredPass`] starts a [`PressureMonitor`] when the pass begins and
//! stops it when the pass ends, logging the elapsed time and the number of
//! alerts raised in between.

use reposync_core::memory_monitor::PressureMonitor;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of a monitored pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub label: String,
    pub elapsed: Duration,
    /// Alerts raised while the pass was running
    pub alerts: u64,
}

/// RAII guard keeping a monitor running for the duration of a pass
///
/// Monitoring stops when the guard is dropped or [`finish`](Self::finish) is
/// called. If the monitor was already running when the pass began, it is
/// still stopped at the end.
pub struct MonitoredPass<'a> {
    monitor: &'a PressureMonitor,
    label: String,
    started: Instant,
    alerts_at_start: u64,
    finished: bool,
}

impl<'a> MonitoredPass<'a> {
    /// Start monitoring and begin timing the pass
    pub fn begin(
        monitor: &'a PressureMonitor,
        label: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let label = label.into();
        let alerts_at_start = monitor.stats().alert_count;
        monitor.start_monitoring(interval);
        info!("Starting monitored pass '{}'", label);

        Self {
            monitor,
            label,
            started: Instant::now(),
            alerts_at_start,
            finished: false,
        }
    }

    /// Alerts raised since the pass began
    pub fn alerts_so_far(&self) -> u64 {
        self.monitor
            .stats()
            .alert_count
            .saturating_sub(self.alerts_at_start)
    }

    /// Stop monitoring and report the pass
    pub fn finish(mut self) -> PassSummary {
        self.complete()
    }

    fn complete(&mut self) -> PassSummary {
        self.finished = true;
        self.monitor.stop_monitoring();

        let summary = PassSummary {
            label: std::mem::take(&mut self.label),
            elapsed: self.started.elapsed(),
            alerts: self.alerts_so_far(),
        };
        info!(
            elapsed_ms = summary.elapsed.as_millis() as u64,
            alerts = summary.alerts,
            "Finished monitored pass '{}'",
            summary.label
        );
        summary
    }
}

impl Drop for MonitoredPass<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.complete();
        }
    }
}
