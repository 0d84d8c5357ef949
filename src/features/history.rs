//! Visit history: a bounded, append-only log of actions at establishments.
//!
//! Entries are identified by their timestamp. Duplicates are allowed and the
//! oldest entries are evicted once the configured cap is reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::{found, require_text, FeatureContext};
use crate::store::validator::ensure_exists;
use crate::store::{
    AddOutcome, CollectionItem, CollectionPolicy, CollectionStore, DedupPolicy, ReferenceValidator,
    StoreError, StoreResult,
};

pub const HISTORY_KEY: &str = "history";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: String,
    pub establishment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn new(action: impl Into<String>, establishment_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            establishment_id: establishment_id.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl CollectionItem for HistoryEntry {
    fn key(&self) -> String {
        self.timestamp.map(|at| at.to_rfc3339()).unwrap_or_default()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.timestamp = Some(at);
    }

    fn validate(&self) -> Result<(), String> {
        require_text("action", &self.action)?;
        require_text("establishment id", &self.establishment_id)
    }
}

/// History log of each owner
pub struct History {
    store: CollectionStore<HistoryEntry>,
    validator: Arc<dyn ReferenceValidator>,
}

impl History {
    pub fn new(ctx: &FeatureContext, max_entries: usize) -> Self {
        let policy = CollectionPolicy::new()
            .with_dedup(DedupPolicy::Disabled)
            .with_max_size(max_entries);
        let store = CollectionStore::new(ctx.backend.clone(), HISTORY_KEY, policy, ctx.clock.clone())
            .with_locks(ctx.locks.clone());

        Self {
            store,
            validator: ctx.validator.clone(),
        }
    }

    /// Maximum number of entries kept per owner
    pub fn max_entries(&self) -> Option<usize> {
        self.store.policy().eviction.limit()
    }

    /// Append an entry, stamping it with the current time if it has none
    pub async fn record(&self, owner: &str, entry: HistoryEntry) -> StoreResult<AddOutcome<HistoryEntry>> {
        entry.validate().map_err(StoreError::Validation)?;
        ensure_exists(self.validator.as_ref(), &entry.establishment_id).await?;

        let outcome = self.store.add(owner, entry).await?;
        if let AddOutcome::Inserted { evicted, .. } = &outcome {
            if !evicted.is_empty() {
                warn!(
                    "History full for {}, dropped {} oldest entr{}",
                    owner,
                    evicted.len(),
                    if evicted.len() == 1 { "y" } else { "ies" }
                );
            }
        }
        Ok(outcome)
    }

    /// Undo the newest entry
    pub async fn rollback_last(&self, owner: &str) -> StoreResult<Option<HistoryEntry>> {
        self.store.rollback_last(owner).await
    }

    /// Undo the newest entry with the given action
    pub async fn rollback_last_by_action(&self, owner: &str, action: &str) -> StoreResult<Option<HistoryEntry>> {
        let action = action.to_string();
        self.store
            .rollback_last_matching(owner, move |entry| entry.action == action)
            .await
    }

    /// Undo every entry recorded within `[start, end]`
    pub async fn rollback_range(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<HistoryEntry>> {
        self.store.rollback_range(owner, start, end).await
    }

    /// All entries, oldest first
    pub async fn list(&self, owner: &str) -> StoreResult<Vec<HistoryEntry>> {
        self.store.list(owner).await
    }

    pub async fn by_action(&self, owner: &str, action: &str) -> StoreResult<Vec<HistoryEntry>> {
        let action = action.to_string();
        self.store
            .search(owner, move |entry| entry.action == action)
            .await
    }

    pub async fn by_establishment(&self, owner: &str, establishment_id: &str) -> StoreResult<Vec<HistoryEntry>> {
        ensure_exists(self.validator.as_ref(), establishment_id).await?;
        let establishment_id = establishment_id.to_string();
        self.store
            .search(owner, move |entry| entry.establishment_id == establishment_id)
            .await
    }

    /// The first entry recorded at exactly `timestamp`
    pub async fn by_timestamp(&self, owner: &str, timestamp: DateTime<Utc>) -> StoreResult<HistoryEntry> {
        let entry = self
            .store
            .search(owner, move |entry| entry.timestamp == Some(timestamp))
            .await?
            .into_iter()
            .next();
        found(entry, HISTORY_KEY, &timestamp.to_rfc3339())
    }

    pub async fn exists_at(&self, owner: &str, timestamp: DateTime<Utc>) -> StoreResult<bool> {
        match self.by_timestamp(owner, timestamp).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn clear(&self, owner: &str) -> StoreResult<bool> {
        self.store.clear(owner).await
    }

    pub async fn count(&self, owner: &str) -> StoreResult<usize> {
        self.store.count(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{fixture, fixture_with_known_places, OWNER};
    use chrono::Duration;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_stamps_time() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);

        history.record(OWNER, HistoryEntry::new("view", "place-1")).await.unwrap();
        fx.clock.advance(Duration::seconds(1));
        history.record(OWNER, HistoryEntry::new("view", "place-1")).await.unwrap();

        let entries = history.list(OWNER).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, Some(ts(1_000)));
        assert_eq!(entries[1].timestamp, Some(ts(1_001)));
    }

    #[tokio::test]
    async fn test_duplicates_allowed() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);
        let entry = HistoryEntry::new("view", "place-1").at(ts(5));

        history.record(OWNER, entry.clone()).await.unwrap();
        history.record(OWNER, entry).await.unwrap();

        assert_eq!(history.count(OWNER).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fifo_cap() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 3);
        assert_eq!(history.max_entries(), Some(3));

        for secs in 1..=4 {
            history
                .record(OWNER, HistoryEntry::new("view", "place-1").at(ts(secs)))
                .await
                .unwrap();
        }

        let stamps: Vec<i64> = history
            .list(OWNER)
            .await
            .unwrap()
            .iter()
            .filter_map(|e| e.timestamp.map(|t| t.timestamp()))
            .collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_zero_cap_rejects() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 0);

        let outcome = history
            .record(OWNER, HistoryEntry::new("view", "place-1"))
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Rejected);
        assert_eq!(fx.backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_action_rejected() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);

        let result = history.record(OWNER, HistoryEntry::new(" ", "place-1")).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_establishment() {
        let fx = fixture_with_known_places();
        let history = History::new(&fx.ctx, 100);

        let result = history.record(OWNER, HistoryEntry::new("view", "nowhere")).await;
        assert_eq!(result, Err(StoreError::InvalidReference("nowhere".to_string())));

        let lookup = history.by_establishment(OWNER, "nowhere").await;
        assert_eq!(lookup, Err(StoreError::InvalidReference("nowhere".to_string())));
    }

    #[tokio::test]
    async fn test_rollbacks() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);
        for (secs, action) in [(1, "view"), (2, "save"), (3, "view"), (4, "share")] {
            history
                .record(OWNER, HistoryEntry::new(action, "place-1").at(ts(secs)))
                .await
                .unwrap();
        }

        let last = history.rollback_last(OWNER).await.unwrap().unwrap();
        assert_eq!(last.action, "share");

        let save = history.rollback_last_by_action(OWNER, "save").await.unwrap().unwrap();
        assert_eq!(save.timestamp, Some(ts(2)));
        assert!(history.rollback_last_by_action(OWNER, "save").await.unwrap().is_none());

        let actions: Vec<String> = history
            .list(OWNER)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["view", "view"]);
    }

    #[tokio::test]
    async fn test_rollback_range() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);
        for secs in 1..=5 {
            history
                .record(OWNER, HistoryEntry::new("view", "place-1").at(ts(secs)))
                .await
                .unwrap();
        }

        let removed = history.rollback_range(OWNER, ts(2), ts(4)).await.unwrap();
        assert_eq!(removed.len(), 3);

        assert!(history.exists_at(OWNER, ts(1)).await.unwrap());
        assert!(!history.exists_at(OWNER, ts(3)).await.unwrap());
        assert!(history.exists_at(OWNER, ts(5)).await.unwrap());

        let inverted = history.rollback_range(OWNER, ts(4), ts(2)).await;
        assert!(matches!(inverted, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_queries() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);
        history
            .record(OWNER, HistoryEntry::new("view", "place-1").at(ts(1)))
            .await
            .unwrap();
        history
            .record(OWNER, HistoryEntry::new("save", "place-2").at(ts(2)))
            .await
            .unwrap();
        history
            .record(OWNER, HistoryEntry::new("view", "place-2").at(ts(3)))
            .await
            .unwrap();

        assert_eq!(history.by_action(OWNER, "view").await.unwrap().len(), 2);
        assert_eq!(history.by_establishment(OWNER, "place-2").await.unwrap().len(), 2);

        let entry = history.by_timestamp(OWNER, ts(2)).await.unwrap();
        assert_eq!(entry.action, "save");
        assert!(matches!(
            history.by_timestamp(OWNER, ts(9)).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let fx = fixture();
        let history = History::new(&fx.ctx, 100);
        assert!(!history.clear(OWNER).await.unwrap());

        history.record(OWNER, HistoryEntry::new("view", "place-1")).await.unwrap();
        assert!(history.clear(OWNER).await.unwrap());
        assert_eq!(history.count(OWNER).await.unwrap(), 0);
    }
}
