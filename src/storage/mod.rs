//! Storage module for whole-document profile records.
//!
//! Every owner (user) has exactly one record: a JSON object whose top-level
//! keys are independent sub-collections. The backend contract is deliberately
//! narrow: fetch the whole record, or overwrite the whole record. There is no
//! partial write, no compare-and-swap and no versioning.
//!
//! Implementations:
//! - [`InMemoryBackend`] for tests and ephemeral deployments
//! - [`SledBackend`] for single-node persistence

mod memory;
mod sled_store;

pub use memory::InMemoryBackend;
pub use sled_store::SledBackend;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A whole profile record: sub-collection name to list or object
pub type Document = Map<String, Value>;

/// Errors surfaced by a record backend. Propagated unchanged by the stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Whole-document key-value record store.
///
/// `get` of an owner that was never written returns an empty document.
/// Neither call is retried by callers; retry policy belongs to the backend.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Fetch the entire record for `owner`
    async fn get(&self, owner: &str) -> BackendResult<Document>;

    /// Overwrite the entire record for `owner`
    async fn set(&self, owner: &str, doc: Document) -> BackendResult<()>;
}

/// Configuration for the persistent backend
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Cache size in bytes (default: 64MB)
    pub cache_size: u64,
    /// Flush interval in milliseconds (0 = flush after every write)
    pub flush_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/profiles.sled".to_string(),
            cache_size: 64 * 1024 * 1024,
            flush_interval_ms: 500,
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_flush_interval(mut self, interval_ms: u64) -> Self {
        self.flush_interval_ms = interval_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, "./data/profiles.sled");
        assert_eq!(config.flush_interval_ms, 500);
    }

    #[test]
    fn test_storage_config_builder() {
        let config = StorageConfig::new("/tmp/x.sled")
            .with_cache_size(1024)
            .with_flush_interval(0);

        assert_eq!(config.path, "/tmp/x.sled");
        assert_eq!(config.cache_size, 1024);
        assert_eq!(config.flush_interval_ms, 0);
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Unavailable("timeout".to_string());
        assert_eq!(err.to_string(), "Backend unavailable: timeout");

        let err = BackendError::NotAuthorized("token expired".to_string());
        assert_eq!(err.to_string(), "Not authorized: token expired");
    }
}
