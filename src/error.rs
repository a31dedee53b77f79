//! Error types for the store and cache layers
//!
//! A cache miss is never represented here: getters return `Option` and an
//! absent or expired value is simply `None`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the on-disk key/value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be opened or created
    #[error("Cache store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file exists but does not hold a readable store document
    #[error("Cache store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The backing file was written by an incompatible format version
    #[error("Cache store at {path} has unsupported format version {found}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    /// A read was issued for a key the store does not hold
    #[error("Key not found in cache store: {0}")]
    KeyNotFound(String),

    /// Writing the store back to disk failed
    #[error("Cache store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The store has already been closed
    #[error("Cache store is closed")]
    Closed,
}

impl StoreError {
    /// Whether this error came from opening the store (as opposed to using it)
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable { .. }
                | StoreError::Corrupt { .. }
                | StoreError::UnsupportedVersion { .. }
        )
    }
}

/// Errors raised by cache writes and invalidation
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value could not be encoded for storage
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    /// The cache has been closed
    #[error("Cache is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_includes_path() {
        let err = StoreError::Unavailable {
            path: PathBuf::from("/nope/cache.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope/cache.json"));
        assert!(msg.contains("denied"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_runtime_errors_are_not_unavailable() {
        assert!(!StoreError::Closed.is_unavailable());
        assert!(!StoreError::KeyNotFound("shows".to_string()).is_unavailable());
    }

    #[test]
    fn test_cache_error_wraps_store_error_transparently() {
        let err: CacheError = StoreError::KeyNotFound("shows".to_string()).into();
        assert_eq!(err.to_string(), "Key not found in cache store: shows");
    }
}
