//! Per-owner serialization of read-modify-write cycles.
//!
//! One async mutex per owner id, created lazily. Different owners never
//! contend. The table must be shared by every store writing to the same
//! records, since all features live in one document per owner.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by owner id
#[derive(Clone, Default)]
pub struct OwnerLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner`'s record
    pub async fn acquire(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(owner.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Get the number of owners seen so far
    pub fn owner_count(&self) -> usize {
        self.locks.len()
    }
}
