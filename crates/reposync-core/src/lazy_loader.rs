//! Deferred, thread-safe initialization of expensive values
//!
//! A [`LazyLoader`] wraps a factory and runs it on first access. Concurrent
//! first callers block until the single factory invocation finishes, then all
//! of them observe the same result. Failures are cached like successes until
//! [`LazyLoader::reset`] starts a new epoch.
//!
//! # Example
//!
//! ```
//! use reposync_core::LazyLoader;
//! use std::sync::Arc;
//!
//! let loader: LazyLoader<Arc<Vec<String>>> =
//!     LazyLoader::new(|| Ok(Arc::new(vec!["main".to_string(), "dev".to_string()])));
//! assert!(!loader.is_loaded());
//!
//! let branches = loader.get().unwrap();
//! assert_eq!(branches.len(), 2);
//! assert_eq!(loader.load_count(), 1);
//! ```

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::counters::Counter;
use crate::error::ResourceError;

type Factory<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// Lazily constructed value with at-most-once-per-epoch initialization
///
/// `T` and `E` are cloned out to every caller, so large values should be
/// wrapped in an `Arc`.
pub struct LazyLoader<T, E = ResourceError> {
    factory: Factory<T, E>,
    state: RwLock<Option<Result<T, E>>>,
    loaded: AtomicBool,
    load_count: Counter,
}

impl<T, E> LazyLoader<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Create a loader. The factory is not called until the first [`get`](Self::get).
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            state: RwLock::new(None),
            loaded: AtomicBool::new(false),
            load_count: Counter::new(),
        }
    }

    /// Get the value, running the factory if this epoch has not loaded yet
    ///
    /// A factory error is returned verbatim and cached for the rest of the
    /// epoch; it is not retried until [`reset`](Self::reset) is called.
    pub fn get(&self) -> Result<T, E> {
        {
            let state = self.state.read();
            if let Some(cached) = state.as_ref() {
                return cached.clone();
            }
        }

        let mut state = self.state.write();
        if let Some(cached) = state.as_ref() {
            return cached.clone();
        }

        self.load_count.incr();
        let result = (self.factory)();
        *state = Some(result.clone());
        self.loaded.store(true, Ordering::Release);

        result
    }

    /// Whether the current epoch has a cached result. Never blocks.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Discard the cached result so the next [`get`](Self::get) reruns the factory
    pub fn reset(&self) {
        let mut state = self.state.write();
        self.loaded.store(false, Ordering::Release);
        *state = None;
    }

    /// Number of factory invocations over the loader's whole lifetime
    pub fn load_count(&self) -> u64 {
        self.load_count.get()
    }
}

impl<T, E> fmt::Debug for LazyLoader<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("loaded", &self.loaded.load(Ordering::Acquire))
            .field("load_count", &self.load_count.get())
            .finish_non_exhaustive()
    }
}
