//! End-to-end tests for the memory-pressure monitor

mod common;

use common::{ScriptedSampler, channel_callback, drain, wait_for_alert};
use reposync::{AlertType, MonitoredPass, PressureMonitor, Severity, Thresholds};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_low_threshold_raises_heap_alloc_alert() {
    let thresholds = Thresholds {
        heap_alloc_bytes: MB,
        ..Thresholds::default()
    };
    let (callback, mut rx) = channel_callback();
    let monitor = PressureMonitor::new(thresholds, Some(callback));

    monitor.start_monitoring(Duration::from_millis(10));
    let ballast = black_box(vec![1u8; 4 * MB as usize]);

    let alert = wait_for_alert(&mut rx, Duration::from_millis(100), |alert| {
        alert.alert_type == AlertType::HeapAlloc
    })
    .await
    .expect("no heap_alloc alert within 100ms");

    assert_eq!(alert.alert_type.as_str(), "heap_alloc");
    assert_eq!(alert.threshold, MB);
    assert!(alert.observed > MB);
    assert_eq!(alert.stats.heap_alloc_bytes, alert.observed);
    assert!(alert.severity >= Severity::Info);
    drop(ballast);

    monitor.stop_monitoring();
    // Callbacks for ticks that ran before the stop can still land after it
    // returns. Wait for those, then discard them.
    tokio::time::sleep(Duration::from_millis(20)).await;
    drain(&mut rx);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "alert delivered after stop");
    assert!(!monitor.stats().monitoring_enabled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alert_classification_follows_sampler() {
    let sampler = Arc::new(ScriptedSampler::default());
    let (callback, mut rx) = channel_callback();
    let monitor = PressureMonitor::with_sampler(
        Thresholds {
            heap_alloc_bytes: 100 * MB,
            heap_sys_bytes: u64::MAX,
            max_tasks: u64::MAX,
            ..Thresholds::default()
        },
        Some(callback),
        sampler.clone(),
    );

    sampler.set_heap_alloc(150 * MB);
    monitor.start_monitoring(Duration::from_millis(5));
    let warning = wait_for_alert(&mut rx, Duration::from_secs(1), |_| true)
        .await
        .expect("no warning alert");
    assert_eq!(warning.severity, Severity::Warning);

    sampler.set_heap_alloc(200 * MB);
    let critical = wait_for_alert(&mut rx, Duration::from_secs(1), |alert| {
        alert.severity == Severity::Critical
    })
    .await
    .expect("no critical alert");
    assert_eq!(critical.observed, 200 * MB);

    monitor.stop_monitoring();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stats = monitor.stats();
    assert!(stats.high_pressure_events >= 2);
    assert_eq!(stats.high_pressure_events, stats.alert_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_callback_does_not_stall_sampling() {
    let sampler = Arc::new(ScriptedSampler::default());
    sampler.set_heap_alloc(300 * MB);
    let callback: reposync::AlertCallback = Arc::new(|_: reposync::Alert| {
        std::thread::sleep(Duration::from_millis(200));
    });
    let monitor = PressureMonitor::with_sampler(
        Thresholds::default(),
        Some(callback),
        sampler.clone(),
    );

    monitor.start_monitoring(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(100)).await;
    monitor.stop_monitoring();

    // The sampling loop keeps ticking while callbacks sleep
    assert!(sampler.calls() >= 3, "only {} samples", sampler.calls());
}

#[tokio::test]
async fn test_alert_serializes_for_log_pipeline() {
    let sampler = Arc::new(ScriptedSampler::default());
    sampler.set_heap_alloc(250 * MB);
    let (callback, mut rx) = channel_callback();
    let monitor = PressureMonitor::with_sampler(Thresholds::default(), Some(callback), sampler);

    let pass = MonitoredPass::begin(&monitor, "serialize", Duration::from_millis(5));
    let alert = wait_for_alert(&mut rx, Duration::from_secs(1), |_| true)
        .await
        .expect("no alert");
    let summary = pass.finish();
    assert!(summary.alerts >= 1);

    let json = serde_json::to_value(&alert).unwrap();
    assert_eq!(json["alert_type"], "heap_alloc");
    assert_eq!(json["severity"], "critical");
    assert_eq!(json["stats"]["heap_alloc_bytes"], 250 * MB);
}

#[tokio::test]
async fn test_logging_monitor_runs_without_subscriber() {
    let monitor = PressureMonitor::with_logging(Thresholds {
        heap_alloc_bytes: 1,
        ..Thresholds::default()
    });

    monitor.start_monitoring(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(30)).await;
    monitor.stop_monitoring();

    assert!(monitor.stats().alert_count >= 1);
    assert!(monitor.last_stats().is_some());
}
