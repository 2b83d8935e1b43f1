//! Durable key/value cache for fetched resources
//!
//! A `CacheStore` keeps at most one entry per key. Every entry carries the
//! time it was written and a TTL, so callers can ask whether a key is expired
//! without reading its value. Expiry is logical: an expired entry stays
//! readable until it is overwritten.

mod file_store;

pub use file_store::FileCacheStore;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reading or writing cache entries
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem access failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized or parsed
    #[error("Cache entry is malformed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// TTL cannot be represented as an expiry timestamp
    #[error("Invalid TTL: {0:?}")]
    InvalidTtl(Duration),
}

/// Key/value storage with per-entry TTL
///
/// Implementations must be safe to call from concurrent fetches. A `put`
/// replaces the previous entry for the key atomically.
pub trait CacheStore: Send + Sync {
    /// Stores `value` under `key`, stamped with the current time and `ttl`
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the most recently stored value for `key`, expired or not
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Returns true if there is no usable entry for `key` or its TTL has elapsed
    fn is_expired(&self, key: &str) -> bool;
}
