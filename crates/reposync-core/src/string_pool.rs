//! String interning for memory optimization
//!
//! Responses from the GitHub API repeat the same small strings (owner names,
//! repository slugs, file paths) thousands of times per synchronization pass.
//! [`StringIntern`] deduplicates them into shared `Arc<str>` instances.
//!
//! The table is bounded. When it is full, a batch of roughly a tenth of the
//! entries is dropped in the map's own iteration order before the next insert.
//! This is intentionally not LRU: eviction stays cheap and ignores recency.
//! Evicted strings stay alive for anyone still holding them; only the
//! deduplication of future lookups is lost.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::counters::Counter;

/// Default bound used by [`StringIntern::new`]
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Process-wide interner shared by callers that do not own one
static GLOBAL_INTERN: Lazy<StringIntern> = Lazy::new(StringIntern::new);

/// Get the process-wide string interner
pub fn global() -> &'static StringIntern {
    &GLOBAL_INTERN
}

/// Bounded string-interning cache
pub struct StringIntern {
    table: RwLock<HashSet<Arc<str>>>,
    max_size: usize,
    hits: Counter,
    misses: Counter,
    evicted: Counter,
    size: Counter,
}

/// Statistics about string interning
///
/// Each field is loaded independently, so the values are advisory and may not
/// describe a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InternStats {
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
    pub size: u64,
    pub max_size: usize,
}

impl Default for StringIntern {
    fn default() -> Self {
        Self::new()
    }
}

impl StringIntern {
    /// Create an interner bounded at [`DEFAULT_MAX_SIZE`] entries
    pub fn new() -> Self {
        Self::with_size(DEFAULT_MAX_SIZE)
    }

    /// Create an interner bounded at `max_size` entries
    ///
    /// A `max_size` of `0` means unbounded: the table is never evicted.
    pub fn with_size(max_size: usize) -> Self {
        Self {
            table: RwLock::new(HashSet::new()),
            max_size,
            hits: Counter::new(),
            misses: Counter::new(),
            evicted: Counter::new(),
            size: Counter::new(),
        }
    }

    /// Get the canonical shared instance for `s`, inserting it if needed
    pub fn intern(&self, s: &str) -> Arc<str> {
        {
            let table = self.table.read();
            if let Some(canonical) = table.get(s) {
                self.hits.incr();
                return Arc::clone(canonical);
            }
        }

        self.intern_slow(s)
    }

    #[cold]
    fn intern_slow(&self, s: &str) -> Arc<str> {
        let mut table = self.table.write();

        // Another writer may have inserted it between the two locks
        if let Some(canonical) = table.get(s) {
            self.hits.incr();
            return Arc::clone(canonical);
        }

        if self.max_size > 0 && table.len() >= self.max_size {
            let removed = evict_batch(&mut table);
            self.evicted.add(removed as u64);
            debug!(
                "String pool full ({} entries), evicted {}",
                self.max_size, removed
            );
        }

        let canonical: Arc<str> = Arc::from(s);
        table.insert(Arc::clone(&canonical));
        self.misses.incr();
        self.size.set(table.len() as u64);

        canonical
    }

    /// Get current interner statistics
    pub fn stats(&self) -> InternStats {
        InternStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
            evicted: self.evicted.get(),
            size: self.size.get(),
            max_size: self.max_size,
        }
    }

    /// Number of strings currently interned
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Drop every entry. Hit, miss, and eviction counters are kept.
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.clear();
        self.size.set(0);
    }
}

/// Remove `max(1, len / 10)` entries in the set's iteration order
fn evict_batch(table: &mut HashSet<Arc<str>>) -> usize {
    let target = (table.len() / 10).max(1);
    let mut remaining = target;
    table.retain(|_| {
        if remaining > 0 {
            remaining -= 1;
            false
        } else {
            true
        }
    });
    target - remaining
}
