//! Error types for reposync resource management
//!
//! Interning and memory monitoring never fail. The only errors surfaced by
//! this crate come from lazy-loader factories and from configuration parsing.
//!
//! # Example
//!
//! ```
//! use reposync_core::error::{ResourceError, Result};
//!
//! fn load_index() -> Result<Vec<String>> {
//!     Err(ResourceError::LoadFailed("index file missing".to_string()))
//! }
//!
//! assert!(load_index().is_err());
//! ```

use thiserror::Error;

/// Main error type for reposync resource operations
///
/// The type is `Clone` so a cached factory failure can be handed to every
/// caller of a [`LazyLoader`](crate::lazy_loader::LazyLoader) epoch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A lazy-loader factory failed to produce its value
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// A configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Results in reposync
pub type Result<T> = std::result::Result<T, ResourceError>;
