//! Named collections of places.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{found, require_text, FeatureContext};
use crate::store::validator::ensure_exists;
use crate::store::{
    AddOutcome, CollectionItem, CollectionPolicy, CollectionStore, ReferenceValidator, StoreError,
    StoreResult,
};

pub const COLLECTIONS_KEY: &str = "collections";

/// A user-named group of places
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub places_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CollectionItem for Collection {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn validate(&self) -> Result<(), String> {
        require_text("collection name", &self.name)?;
        self.places_ids
            .iter()
            .try_for_each(|place_id| require_text("place id", place_id))
    }
}

pub struct Collections {
    store: CollectionStore<Collection>,
    validator: Arc<dyn ReferenceValidator>,
}

impl Collections {
    pub fn new(ctx: &FeatureContext) -> Self {
        let store = CollectionStore::new(
            ctx.backend.clone(),
            COLLECTIONS_KEY,
            CollectionPolicy::new(),
            ctx.clock.clone(),
        )
        .with_locks(ctx.locks.clone());

        Self {
            store,
            validator: ctx.validator.clone(),
        }
    }

    /// Create a collection under a freshly generated id
    pub async fn create(
        &self,
        owner: &str,
        name: impl Into<String>,
        place_ids: Vec<String>,
    ) -> StoreResult<Collection> {
        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            places_ids: dedup_places(place_ids),
            created_at: None,
        };
        self.check(&collection).await?;

        match self.store.add(owner, collection).await? {
            AddOutcome::Inserted { item, .. } => Ok(item),
            AddOutcome::Duplicate => Err(StoreError::validation("collection id already exists")),
            AddOutcome::Rejected => Err(StoreError::validation("no more collections allowed")),
        }
    }

    pub async fn get(&self, owner: &str, id: &str) -> StoreResult<Collection> {
        let collection = self.store.find(owner, id).await?;
        found(collection, COLLECTIONS_KEY, id)
    }

    pub async fn list(&self, owner: &str) -> StoreResult<Vec<Collection>> {
        self.store.list(owner).await
    }

    /// Rename a collection and replace its places; `createdAt` is kept
    pub async fn update(
        &self,
        owner: &str,
        id: &str,
        name: impl Into<String>,
        place_ids: Vec<String>,
    ) -> StoreResult<Collection> {
        let collection = Collection {
            id: id.to_string(),
            name: name.into(),
            places_ids: dedup_places(place_ids),
            created_at: None,
        };
        self.check(&collection).await?;

        let updated = self.store.update(owner, id, collection).await?;
        found(updated, COLLECTIONS_KEY, id)
    }

    pub async fn delete(&self, owner: &str, id: &str) -> StoreResult<Collection> {
        let removed = self.store.remove(owner, id).await?;
        found(removed, COLLECTIONS_KEY, id)
    }

    pub async fn count(&self, owner: &str) -> StoreResult<usize> {
        self.store.count(owner).await
    }

    /// Add a place to a collection; adding a place twice is a no-op
    pub async fn add_place(&self, owner: &str, id: &str, place_id: &str) -> StoreResult<Collection> {
        ensure_exists(self.validator.as_ref(), place_id).await?;

        let place_id = place_id.to_string();
        let updated = self
            .store
            .modify(owner, id, move |collection| {
                if collection.places_ids.contains(&place_id) {
                    return false;
                }
                collection.places_ids.push(place_id);
                true
            })
            .await?;
        found(updated, COLLECTIONS_KEY, id)
    }

    /// Remove a place from a collection; removing an absent place is a no-op
    pub async fn remove_place(&self, owner: &str, id: &str, place_id: &str) -> StoreResult<Collection> {
        let place_id = place_id.to_string();
        let updated = self
            .store
            .modify(owner, id, move |collection| {
                let before = collection.places_ids.len();
                collection.places_ids.retain(|p| *p != place_id);
                collection.places_ids.len() != before
            })
            .await?;
        found(updated, COLLECTIONS_KEY, id)
    }

    /// Empty a collection, keeping the collection itself
    pub async fn clear_places(&self, owner: &str, id: &str) -> StoreResult<Collection> {
        let updated = self
            .store
            .modify(owner, id, |collection| {
                let had_places = !collection.places_ids.is_empty();
                collection.places_ids.clear();
                had_places
            })
            .await?;
        found(updated, COLLECTIONS_KEY, id)
    }

    /// Collections whose name equals `name`, ignoring case
    pub async fn search_by_name(&self, owner: &str, name: &str) -> StoreResult<Vec<Collection>> {
        let name = name.to_lowercase();
        self.store
            .search(owner, move |collection| collection.name.to_lowercase() == name)
            .await
    }

    async fn check(&self, collection: &Collection) -> StoreResult<()> {
        collection.validate().map_err(StoreError::Validation)?;
        for place_id in &collection.places_ids {
            ensure_exists(self.validator.as_ref(), place_id).await?;
        }
        Ok(())
    }
}

fn dedup_places(place_ids: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(place_ids.len());
    for place_id in place_ids {
        if !unique.contains(&place_id) {
            unique.push(place_id);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{fixture, fixture_with_known_places, OWNER};
    use chrono::Duration;

    fn places(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);

        let created = collections
            .create(OWNER, "Tokyo trip", places(&["place-1", "place-2", "place-1"]))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.places_ids, places(&["place-1", "place-2"]));
        assert!(created.created_at.is_some());
        assert_eq!(collections.get(OWNER, &created.id).await.unwrap(), created);
        assert_eq!(collections.count(OWNER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_validates() {
        let fx = fixture_with_known_places();
        let collections = Collections::new(&fx.ctx);

        let blank = collections.create(OWNER, "  ", Vec::new()).await;
        assert!(matches!(blank, Err(StoreError::Validation(_))));

        let unknown = collections
            .create(OWNER, "Trip", places(&["place-1", "atlantis"]))
            .await;
        assert_eq!(unknown, Err(StoreError::InvalidReference("atlantis".to_string())));
        assert_eq!(fx.backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);
        let created = collections.create(OWNER, "Old", Vec::new()).await.unwrap();

        fx.clock.advance(Duration::days(1));
        let updated = collections
            .update(OWNER, &created.id, "New", places(&["place-3"]))
            .await
            .unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.places_ids, places(&["place-3"]));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);
        let not_found = StoreError::not_found(COLLECTIONS_KEY, "ghost");

        assert_eq!(collections.get(OWNER, "ghost").await, Err(not_found.clone()));
        assert_eq!(collections.delete(OWNER, "ghost").await, Err(not_found.clone()));
        assert_eq!(
            collections.update(OWNER, "ghost", "x", Vec::new()).await,
            Err(not_found.clone())
        );
        assert_eq!(
            collections.add_place(OWNER, "ghost", "place-1").await,
            Err(not_found)
        );
    }

    #[tokio::test]
    async fn test_place_membership() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);
        let created = collections.create(OWNER, "Trip", Vec::new()).await.unwrap();

        collections.add_place(OWNER, &created.id, "place-1").await.unwrap();
        let twice = collections.add_place(OWNER, &created.id, "place-1").await.unwrap();
        assert_eq!(twice.places_ids, places(&["place-1"]));

        collections.add_place(OWNER, &created.id, "place-2").await.unwrap();
        let removed = collections
            .remove_place(OWNER, &created.id, "place-1")
            .await
            .unwrap();
        assert_eq!(removed.places_ids, places(&["place-2"]));

        let absent = collections
            .remove_place(OWNER, &created.id, "place-9")
            .await
            .unwrap();
        assert_eq!(absent.places_ids, places(&["place-2"]));

        let cleared = collections.clear_places(OWNER, &created.id).await.unwrap();
        assert!(cleared.places_ids.is_empty());
        assert_eq!(cleared.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_add_unknown_place() {
        let fx = fixture_with_known_places();
        let collections = Collections::new(&fx.ctx);
        let created = collections.create(OWNER, "Trip", Vec::new()).await.unwrap();

        let result = collections.add_place(OWNER, &created.id, "atlantis").await;
        assert_eq!(result, Err(StoreError::InvalidReference("atlantis".to_string())));
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);
        collections.create(OWNER, "Date Night", Vec::new()).await.unwrap();
        collections.create(OWNER, "Lunch", Vec::new()).await.unwrap();

        let hits = collections.search_by_name(OWNER, "date night").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Date Night");
        assert!(collections.search_by_name(OWNER, "date").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let fx = fixture();
        let collections = Collections::new(&fx.ctx);
        let a = collections.create(OWNER, "A", Vec::new()).await.unwrap();
        let b = collections.create(OWNER, "B", Vec::new()).await.unwrap();

        let deleted = collections.delete(OWNER, &a.id).await.unwrap();
        assert_eq!(deleted.name, "A");

        let remaining = collections.list(OWNER).await.unwrap();
        assert_eq!(remaining, vec![b]);
    }
}
