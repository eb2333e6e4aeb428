//! # Global Cache Management
//!
//! The default process-wide [`QueryCache`]. Containers take an explicit cache handle, so
//! this singleton is only a convenience for applications that want every container to
//! share one cache without threading it through by hand.

use std::sync::OnceLock;

use crate::cache::QueryCache;

/// Error type for global cache operations
#[derive(Debug, thiserror::Error)]
pub enum GlobalCacheError {
    #[error("Global cache not initialized. Call init_global_cache() first.")]
    NotInitialized,
}

/// Global singleton instance of the query cache
static GLOBAL_CACHE: OnceLock<QueryCache> = OnceLock::new();

/// Initialize the global query cache
///
/// Call once at application start. Calling it again is a no-op that returns the
/// already-initialized cache.
///
/// ## Example
///
/// ```rust
/// use store_query::global::{get_global_cache, init_global_cache};
///
/// init_global_cache();
/// assert!(get_global_cache().is_ok());
/// ```
pub fn init_global_cache() -> &'static QueryCache {
    GLOBAL_CACHE.get_or_init(QueryCache::new)
}

/// Get the global query cache instance
///
/// ## Errors
///
/// Returns `GlobalCacheError::NotInitialized` if `init_global_cache()` has not been called yet.
pub fn get_global_cache() -> Result<&'static QueryCache, GlobalCacheError> {
    GLOBAL_CACHE.get().ok_or(GlobalCacheError::NotInitialized)
}

/// Check if the global cache has been initialized
pub fn is_initialized() -> bool {
    GLOBAL_CACHE.get().is_some()
}
