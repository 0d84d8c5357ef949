//! Foreign-reference checks run before any read-modify-write.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::warn;

use super::{StoreError, StoreResult};

/// Answers whether an externally owned entity (e.g. a place) exists
#[async_trait]
pub trait ReferenceValidator: Send + Sync {
    async fn exists(&self, ref_id: &str) -> bool;
}

/// Accepts every non-blank reference
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl ReferenceValidator for AcceptAll {
    async fn exists(&self, _ref_id: &str) -> bool {
        true
    }
}

/// Accepts only references from a fixed set of ids
#[derive(Debug, Clone, Default)]
pub struct KnownReferences {
    ids: HashSet<String>,
}

impl KnownReferences {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
impl ReferenceValidator for KnownReferences {
    async fn exists(&self, ref_id: &str) -> bool {
        self.ids.contains(ref_id)
    }
}

/// Fail with `Validation` for a blank id and `InvalidReference` for an unknown one
pub async fn ensure_exists(validator: &dyn ReferenceValidator, ref_id: &str) -> StoreResult<()> {
    if ref_id.trim().is_empty() {
        return Err(StoreError::validation("reference id must not be blank"));
    }
    if !validator.exists(ref_id).await {
        warn!("Reference {} does not exist", ref_id);
        return Err(StoreError::InvalidReference(ref_id.to_string()));
    }
    Ok(())
}
