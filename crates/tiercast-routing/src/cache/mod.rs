//! Fallback caching of successful inference outputs.
//!
//! Entries are keyed by request fingerprint and served, marked stale, only
//! when every live tier has failed a request.

/// Cache storage implementation
pub mod storage;

pub use storage::{CacheEntry, CacheStats, FallbackCache};
