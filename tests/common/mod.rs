//! Common test utilities for reposync integration tests

#![allow(dead_code)]

use reposync::{Alert, AlertCallback, MemorySampler, MemoryStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Callback forwarding every alert into a channel
pub fn channel_callback() -> (AlertCallback, mpsc::UnboundedReceiver<Alert>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: AlertCallback = Arc::new(move |alert: Alert| {
        let _ = tx.send(alert);
    });
    (callback, rx)
}

/// Discard everything already queued
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Alert>) -> usize {
    let mut drained = 0;
    while rx.try_recv().is_ok() {
        drained += 1;
    }
    drained
}

/// Wait up to `within` for an alert matching `pred`
pub async fn wait_for_alert<F>(
    rx: &mut mpsc::UnboundedReceiver<Alert>,
    within: Duration,
    pred: F,
) -> Option<Alert>
where
    F: Fn(&Alert) -> bool,
{
    tokio::time::timeout(within, async {
        while let Some(alert) = rx.recv().await {
            if pred(&alert) {
                return Some(alert);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Sampler whose readings are set by the test
#[derive(Default)]
pub struct ScriptedSampler {
    pub heap_alloc: AtomicU64,
    pub heap_sys: AtomicU64,
    pub tasks: AtomicU64,
    pub calls: AtomicU64,
}

impl ScriptedSampler {
    pub fn set_heap_alloc(&self, bytes: u64) {
        self.heap_alloc.store(bytes, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MemorySampler for ScriptedSampler {
    fn sample(&self) -> MemoryStats {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MemoryStats {
            heap_alloc_bytes: self.heap_alloc.load(Ordering::SeqCst),
            heap_sys_bytes: self.heap_sys.load(Ordering::SeqCst),
            task_count: self.tasks.load(Ordering::SeqCst),
            sampled_at: chrono::Utc::now(),
        }
    }
}
