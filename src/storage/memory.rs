//! In-memory record backend backed by a DashMap.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{BackendResult, Document, RecordBackend};

/// HashMap-style backend for tests and ephemeral deployments.
///
/// Clone-friendly: clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    records: Arc<DashMap<String, Document>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the store layer
    pub fn insert(&self, owner: impl Into<String>, doc: Document) {
        self.records.insert(owner.into(), doc);
    }

    /// Get the number of stored records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordBackend for InMemoryBackend {
    async fn get(&self, owner: &str) -> BackendResult<Document> {
        Ok(self
            .records
            .get(owner)
            .map(|doc| doc.clone())
            .unwrap_or_default())
    }

    async fn set(&self, owner: &str, doc: Document) -> BackendResult<()> {
        debug!("Writing record for {} ({} keys)", owner, doc.len());
        self.records.insert(owner.to_string(), doc);
        Ok(())
    }
}
