//! Lock-free counters shared by the string pool and the memory monitor

use std::sync::atomic::{AtomicU64, Ordering};

/// An integer counter backed by an atomic
///
/// Reads and writes never take a lock, so statistics can be collected from
/// any thread while the owning structure is in use. Values read from several
/// counters are not a consistent snapshot of a single instant.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a counter starting at zero
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Add one and return the new value
    #[inline]
    pub fn incr(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add `n` and return the new value
    #[inline]
    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed) + n
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Overwrite the value, used for gauges such as the current table size
    #[inline]
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}
