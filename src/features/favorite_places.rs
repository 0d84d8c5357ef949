//! Favorite places: a deduplicated list of establishments with notes and ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{found, FeatureContext, SortOrder};
use crate::store::validator::ensure_exists;
use crate::store::{
    AddOutcome, CollectionItem, CollectionPolicy, CollectionStore, ReferenceValidator, StoreError,
    StoreResult,
};

pub const FAVORITE_PLACES_KEY: &str = "favorite_places";

/// A favorited establishment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritePlace {
    pub establishment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl FavoritePlace {
    pub fn new(establishment_id: impl Into<String>) -> Self {
        Self {
            establishment_id: establishment_id.into(),
            added_at: None,
            notes: None,
            rating: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_added_at(mut self, at: DateTime<Utc>) -> Self {
        self.added_at = Some(at);
        self
    }
}

impl CollectionItem for FavoritePlace {
    fn key(&self) -> String {
        self.establishment_id.clone()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.added_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.added_at = Some(at);
    }

    fn validate(&self) -> Result<(), String> {
        match self.rating {
            Some(rating) if !(1..=5).contains(&rating) => {
                Err(format!("rating must be between 1 and 5, got {}", rating))
            }
            _ => Ok(()),
        }
    }
}

/// Favorite places of each owner
pub struct FavoritePlaces {
    store: CollectionStore<FavoritePlace>,
    validator: Arc<dyn ReferenceValidator>,
}

impl FavoritePlaces {
    pub fn new(ctx: &FeatureContext) -> Self {
        let store = CollectionStore::new(
            ctx.backend.clone(),
            FAVORITE_PLACES_KEY,
            CollectionPolicy::new(),
            ctx.clock.clone(),
        )
        .with_locks(ctx.locks.clone());

        Self {
            store,
            validator: ctx.validator.clone(),
        }
    }

    /// Favorite a place. Adding an already favorited place is a no-op.
    pub async fn add(&self, owner: &str, place: FavoritePlace) -> StoreResult<AddOutcome<FavoritePlace>> {
        place.validate().map_err(StoreError::Validation)?;
        ensure_exists(self.validator.as_ref(), &place.establishment_id).await?;
        self.store.add(owner, place).await
    }

    /// Replace notes and rating of a favorite, keeping when it was added.
    /// The place must still exist.
    pub async fn update(
        &self,
        owner: &str,
        establishment_id: &str,
        place: FavoritePlace,
    ) -> StoreResult<FavoritePlace> {
        place.validate().map_err(StoreError::Validation)?;
        ensure_exists(self.validator.as_ref(), establishment_id).await?;
        let updated = self.store.update(owner, establishment_id, place).await?;
        found(updated, FAVORITE_PLACES_KEY, establishment_id)
    }

    pub async fn remove(&self, owner: &str, establishment_id: &str) -> StoreResult<FavoritePlace> {
        let removed = self.store.remove(owner, establishment_id).await?;
        found(removed, FAVORITE_PLACES_KEY, establishment_id)
    }

    pub async fn list(&self, owner: &str) -> StoreResult<Vec<FavoritePlace>> {
        self.store.list(owner).await
    }

    pub async fn get(&self, owner: &str, establishment_id: &str) -> StoreResult<FavoritePlace> {
        let place = self.store.find(owner, establishment_id).await?;
        found(place, FAVORITE_PLACES_KEY, establishment_id)
    }

    /// Remove all favorites. Returns whether there were any stored.
    pub async fn clear(&self, owner: &str) -> StoreResult<bool> {
        self.store.clear(owner).await
    }

    pub async fn is_favorite(&self, owner: &str, establishment_id: &str) -> StoreResult<bool> {
        self.store.is_member(owner, establishment_id).await
    }

    pub async fn count(&self, owner: &str) -> StoreResult<usize> {
        self.store.count(owner).await
    }

    /// Favorites ordered by when they were added; undated ones sort first
    pub async fn sorted_by_date(&self, owner: &str, order: SortOrder) -> StoreResult<Vec<FavoritePlace>> {
        self.store
            .sort_by(owner, |a, b| a.added_at.cmp(&b.added_at), order.is_descending())
            .await
    }

    /// Rated favorites, best first
    pub async fn sorted_by_rating(&self, owner: &str) -> StoreResult<Vec<FavoritePlace>> {
        let mut rated = self.store.search(owner, |p| p.rating.is_some()).await?;
        rated.sort_by(|a, b| b.rating.cmp(&a.rating));
        Ok(rated)
    }

    /// Favorites whose notes contain `query`, ignoring case
    pub async fn search_notes(&self, owner: &str, query: &str) -> StoreResult<Vec<FavoritePlace>> {
        let needle = query.to_lowercase();
        self.store
            .search(owner, move |p| {
                p.notes
                    .as_deref()
                    .is_some_and(|notes| notes.to_lowercase().contains(&needle))
            })
            .await
    }

    /// Undo the most recent favorite
    pub async fn rollback_last(&self, owner: &str) -> StoreResult<Option<FavoritePlace>> {
        self.store.rollback_last(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{fixture, fixture_with_known_places, OWNER};
    use crate::storage::RecordBackend;
    use crate::store::Clock;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_and_get() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        let outcome = places
            .add(OWNER, FavoritePlace::new("place-1").with_rating(4))
            .await
            .unwrap();
        assert!(outcome.is_inserted());

        let place = places.get(OWNER, "place-1").await.unwrap();
        assert_eq!(place.rating, Some(4));
        assert_eq!(place.added_at, Some(fx.clock.now()));
        assert!(places.is_favorite(OWNER, "place-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_twice_is_noop() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        places.add(OWNER, FavoritePlace::new("place-1")).await.unwrap();
        let again = places
            .add(OWNER, FavoritePlace::new("place-1").with_notes("again"))
            .await
            .unwrap();

        assert_eq!(again, AddOutcome::Duplicate);
        assert_eq!(places.count(OWNER).await.unwrap(), 1);
        assert!(places.get(OWNER, "place-1").await.unwrap().notes.is_none());
    }

    #[tokio::test]
    async fn test_unknown_place_rejected() {
        let fx = fixture_with_known_places();
        let places = FavoritePlaces::new(&fx.ctx);

        let result = places.add(OWNER, FavoritePlace::new("place-9")).await;

        assert_eq!(result, Err(StoreError::InvalidReference("place-9".to_string())));
        assert_eq!(fx.backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_update_of_vanished_place_rejected() {
        let fx = fixture_with_known_places();
        let places = FavoritePlaces::new(&fx.ctx);
        let mut doc = crate::storage::Document::new();
        doc.insert(
            FAVORITE_PLACES_KEY.to_string(),
            json!([{ "establishmentId": "place-gone", "addedAt": "2024-01-01T00:00:00Z" }]),
        );
        fx.backend.insert(OWNER, doc.clone());

        let result = places
            .update(OWNER, "place-gone", FavoritePlace::new("place-gone").with_notes("x"))
            .await;

        assert_eq!(result, Err(StoreError::InvalidReference("place-gone".to_string())));
        assert_eq!(fx.backend.get(OWNER).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_rating_out_of_range() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        let result = places
            .add(OWNER, FavoritePlace::new("place-1").with_rating(6))
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_added_at() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);
        places.add(OWNER, FavoritePlace::new("place-1")).await.unwrap();
        let added_at = fx.clock.now();

        fx.clock.advance(Duration::hours(1));
        let updated = places
            .update(OWNER, "place-1", FavoritePlace::new("place-1").with_notes("x"))
            .await
            .unwrap();

        assert_eq!(updated.added_at, Some(added_at));
        assert_eq!(updated.notes.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_missing_favorite_is_not_found() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        let not_found = StoreError::not_found(FAVORITE_PLACES_KEY, "ghost");
        assert_eq!(places.get(OWNER, "ghost").await, Err(not_found.clone()));
        assert_eq!(places.remove(OWNER, "ghost").await, Err(not_found.clone()));
        assert_eq!(
            places.update(OWNER, "ghost", FavoritePlace::new("ghost")).await,
            Err(not_found)
        );
        assert!(!places.clear(OWNER).await.unwrap());
    }

    #[tokio::test]
    async fn test_sorted_by_date() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);
        let base = fx.clock.now();

        places
            .add(OWNER, FavoritePlace::new("b").with_added_at(base + Duration::days(2)))
            .await
            .unwrap();
        places
            .add(OWNER, FavoritePlace::new("a").with_added_at(base + Duration::days(1)))
            .await
            .unwrap();
        places
            .add(OWNER, FavoritePlace::new("c").with_added_at(base + Duration::days(3)))
            .await
            .unwrap();

        let ids = |items: Vec<FavoritePlace>| {
            items
                .into_iter()
                .map(|p| p.establishment_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            ids(places.sorted_by_date(OWNER, SortOrder::Ascending).await.unwrap()),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            ids(places.sorted_by_date(OWNER, SortOrder::Descending).await.unwrap()),
            vec!["c", "b", "a"]
        );
    }

    #[tokio::test]
    async fn test_sorted_by_rating_skips_unrated() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        places.add(OWNER, FavoritePlace::new("ok").with_rating(3)).await.unwrap();
        places.add(OWNER, FavoritePlace::new("unrated")).await.unwrap();
        places.add(OWNER, FavoritePlace::new("best").with_rating(5)).await.unwrap();

        let rated: Vec<String> = places
            .sorted_by_rating(OWNER)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.establishment_id)
            .collect();
        assert_eq!(rated, vec!["best", "ok"]);
    }

    #[tokio::test]
    async fn test_search_notes_ignores_case() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);

        places
            .add(OWNER, FavoritePlace::new("ramen").with_notes("Great Ramen near station"))
            .await
            .unwrap();
        places
            .add(OWNER, FavoritePlace::new("cafe").with_notes("quiet"))
            .await
            .unwrap();
        places.add(OWNER, FavoritePlace::new("plain")).await.unwrap();

        let hits = places.search_notes(OWNER, "ramen").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].establishment_id, "ramen");
    }

    #[tokio::test]
    async fn test_rollback_last() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);
        assert!(places.rollback_last(OWNER).await.unwrap().is_none());

        places.add(OWNER, FavoritePlace::new("a")).await.unwrap();
        places.add(OWNER, FavoritePlace::new("b")).await.unwrap();

        let undone = places.rollback_last(OWNER).await.unwrap().unwrap();
        assert_eq!(undone.establishment_id, "b");
        assert_eq!(places.count(OWNER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wire_format() {
        let fx = fixture();
        let places = FavoritePlaces::new(&fx.ctx);
        places
            .add(OWNER, FavoritePlace::new("place-1").with_rating(2))
            .await
            .unwrap();

        let doc = fx.backend.get(OWNER).await.unwrap();
        let stored = &doc[FAVORITE_PLACES_KEY][0];
        assert_eq!(stored["establishmentId"], json!("place-1"));
        assert_eq!(stored["rating"], json!(2));
        assert!(stored.get("notes").is_none());
        assert!(stored["addedAt"].is_string());
    }
}
