//! Sled-based record backend.
//!
//! Each owner's record is stored as one JSON-encoded value in the `records`
//! tree, keyed by owner id. A write replaces the whole value, matching the
//! whole-document contract of [`RecordBackend`].

use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

use super::{BackendError, BackendResult, Document, RecordBackend, StorageConfig};

/// Tree holding one JSON record per owner
const TREE_RECORDS: &str = "records";

/// Sled-backed whole-document store
#[derive(Clone)]
pub struct SledBackend {
    db: Arc<Db>,
    records: Tree,
}

impl SledBackend {
    /// Open or create a record store at the configured path
    pub fn open(config: &StorageConfig) -> BackendResult<Self> {
        let path = Path::new(&config.path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackendError::Unavailable(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_size)
            .flush_every_ms(if config.flush_interval_ms > 0 {
                Some(config.flush_interval_ms)
            } else {
                None
            })
            .open()
            .map_err(sled_error)?;

        let records = db.open_tree(TREE_RECORDS).map_err(sled_error)?;

        Ok(Self {
            db: Arc::new(db),
            records,
        })
    }

    /// Open with default configuration
    pub fn open_default() -> BackendResult<Self> {
        Self::open(&StorageConfig::default())
    }

    /// Force flush all pending writes to disk
    pub fn flush(&self) -> BackendResult<()> {
        self.db.flush().map_err(sled_error)?;
        Ok(())
    }

    /// Get the number of stored records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordBackend for SledBackend {
    async fn get(&self, owner: &str) -> BackendResult<Document> {
        match self.records.get(owner.as_bytes()).map_err(sled_error)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!("Stored record for {} is not a JSON object: {}", owner, e);
                BackendError::Unavailable(format!("Unreadable record for {}: {}", owner, e))
            }),
            None => Ok(Document::new()),
        }
    }

    async fn set(&self, owner: &str, doc: Document) -> BackendResult<()> {
        let bytes = serde_json::to_vec(&doc)
            .map_err(|e| BackendError::Unavailable(format!("Failed to encode record: {}", e)))?;
        self.records
            .insert(owner.as_bytes(), bytes)
            .map_err(sled_error)?;
        debug!("Persisted record for {}", owner);
        Ok(())
    }
}

fn sled_error(err: sled::Error) -> BackendError {
    BackendError::Unavailable(format!("Sled database error: {}", err))
}

impl Drop for SledBackend {
    fn drop(&mut self) {
        // Attempt to flush on drop, but don't panic
        let _ = self.db.flush();
    }
}
