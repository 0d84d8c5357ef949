//! Request handlers, one group per feature.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiResult;
use super::{AppState, JsonBody, Owner};
use crate::features::{
    Collection, FavoritePlace, FavoritePrompt, HistoryEntry, PreferencesPatch, SortOrder, UserPreferences,
};
use crate::store::AddOutcome;

// ============================================================================
// SHARED TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
    backend: String,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    items: Vec<T>,
    total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct AddResponse<T> {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    evicted: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    cleared: bool,
}

/// 201 for an insert, 200 for a duplicate, 409 when the collection takes no items
fn add_response<T>(outcome: AddOutcome<T>) -> (StatusCode, Json<AddResponse<T>>) {
    let (status, body) = match outcome {
        AddOutcome::Inserted { item, evicted } => (
            StatusCode::CREATED,
            AddResponse {
                outcome: "inserted",
                item: Some(item),
                evicted,
            },
        ),
        AddOutcome::Duplicate => (
            StatusCode::OK,
            AddResponse {
                outcome: "duplicate",
                item: None,
                evicted: Vec::new(),
            },
        ),
        AddOutcome::Rejected => (
            StatusCode::CONFLICT,
            AddResponse {
                outcome: "rejected",
                item: None,
                evicted: Vec::new(),
            },
        ),
    };
    (status, Json(body))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend_name.clone(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

// ============================================================================
// FAVORITE PLACES
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceSort {
    Date,
    Rating,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaceListQuery {
    sort: Option<PlaceSort>,
    order: Option<SortOrder>,
    /// Case-insensitive search in notes
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceUpdateRequest {
    notes: Option<String>,
    rating: Option<u8>,
    added_at: Option<DateTime<Utc>>,
}

pub async fn list_favorite_places(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<PlaceListQuery>,
) -> ApiResult<Json<ListResponse<FavoritePlace>>> {
    let places = &state.services.favorite_places;

    let items = match (query.q, query.sort) {
        (Some(q), _) => places.search_notes(&owner, &q).await?,
        (None, Some(PlaceSort::Date)) => {
            places
                .sorted_by_date(&owner, query.order.unwrap_or_default())
                .await?
        }
        (None, Some(PlaceSort::Rating)) => places.sorted_by_rating(&owner).await?,
        (None, None) => places.list(&owner).await?,
    };
    Ok(Json(items.into()))
}

pub async fn add_favorite_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(place): JsonBody<FavoritePlace>,
) -> ApiResult<(StatusCode, Json<AddResponse<FavoritePlace>>)> {
    let outcome = state.services.favorite_places.add(&owner, place).await?;
    Ok(add_response(outcome))
}

pub async fn clear_favorite_places(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.services.favorite_places.clear(&owner).await?;
    Ok(Json(ClearResponse { cleared }))
}

pub async fn get_favorite_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(establishment_id): Path<String>,
) -> ApiResult<Json<FavoritePlace>> {
    let place = state
        .services
        .favorite_places
        .get(&owner, &establishment_id)
        .await?;
    Ok(Json(place))
}

pub async fn update_favorite_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(establishment_id): Path<String>,
    JsonBody(payload): JsonBody<PlaceUpdateRequest>,
) -> ApiResult<Json<FavoritePlace>> {
    let place = FavoritePlace {
        establishment_id: establishment_id.clone(),
        added_at: payload.added_at,
        notes: payload.notes,
        rating: payload.rating,
    };
    let updated = state
        .services
        .favorite_places
        .update(&owner, &establishment_id, place)
        .await?;
    Ok(Json(updated))
}

pub async fn remove_favorite_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(establishment_id): Path<String>,
) -> ApiResult<Json<FavoritePlace>> {
    let removed = state
        .services
        .favorite_places
        .remove(&owner, &establishment_id)
        .await?;
    Ok(Json(removed))
}

pub async fn rollback_favorite_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<Option<FavoritePlace>>> {
    let undone = state.services.favorite_places.rollback_last(&owner).await?;
    Ok(Json(undone))
}

// ============================================================================
// FAVORITE PROMPTS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    content: String,
    added_at: Option<DateTime<Utc>>,
}

pub async fn list_favorite_prompts(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<ListResponse<FavoritePrompt>>> {
    let prompts = state.services.favorite_prompts.list(&owner).await?;
    Ok(Json(prompts.into()))
}

pub async fn add_favorite_prompt(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(payload): JsonBody<PromptRequest>,
) -> ApiResult<(StatusCode, Json<FavoritePrompt>)> {
    let prompt = state
        .services
        .favorite_prompts
        .add(&owner, payload.content, payload.added_at)
        .await?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

pub async fn clear_favorite_prompts(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.services.favorite_prompts.clear(&owner).await?;
    Ok(Json(ClearResponse { cleared }))
}

pub async fn get_favorite_prompt(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(prompt_id): Path<String>,
) -> ApiResult<Json<FavoritePrompt>> {
    let prompt = state.services.favorite_prompts.get(&owner, &prompt_id).await?;
    Ok(Json(prompt))
}

pub async fn update_favorite_prompt(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(prompt_id): Path<String>,
    JsonBody(payload): JsonBody<PromptRequest>,
) -> ApiResult<Json<FavoritePrompt>> {
    let updated = state
        .services
        .favorite_prompts
        .update(&owner, &prompt_id, payload.content, payload.added_at)
        .await?;
    Ok(Json(updated))
}

pub async fn remove_favorite_prompt(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(prompt_id): Path<String>,
) -> ApiResult<Json<FavoritePrompt>> {
    let removed = state
        .services
        .favorite_prompts
        .remove(&owner, &prompt_id)
        .await?;
    Ok(Json(removed))
}

// ============================================================================
// HISTORY
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    action: Option<String>,
    establishment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RollbackQuery {
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ListResponse<HistoryEntry>>> {
    let history = &state.services.history;

    let entries = match (query.establishment_id, query.action) {
        (Some(establishment_id), action) => {
            let mut entries = history.by_establishment(&owner, &establishment_id).await?;
            if let Some(action) = action {
                entries.retain(|entry| entry.action == action);
            }
            entries
        }
        (None, Some(action)) => history.by_action(&owner, &action).await?,
        (None, None) => history.list(&owner).await?,
    };
    Ok(Json(entries.into()))
}

pub async fn record_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(entry): JsonBody<HistoryEntry>,
) -> ApiResult<(StatusCode, Json<AddResponse<HistoryEntry>>)> {
    let outcome = state.services.history.record(&owner, entry).await?;
    Ok(add_response(outcome))
}

pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.services.history.clear(&owner).await?;
    Ok(Json(ClearResponse { cleared }))
}

pub async fn rollback_history(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<RollbackQuery>,
) -> ApiResult<Json<Option<HistoryEntry>>> {
    let history = &state.services.history;
    let undone = match query.action {
        Some(action) => history.rollback_last_by_action(&owner, &action).await?,
        None => history.rollback_last(&owner).await?,
    };
    Ok(Json(undone))
}

pub async fn rollback_history_range(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(range): JsonBody<RangeRequest>,
) -> ApiResult<Json<ListResponse<HistoryEntry>>> {
    let removed = state
        .services
        .history
        .rollback_range(&owner, range.start, range.end)
        .await?;
    Ok(Json(removed.into()))
}

pub async fn history_at(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(timestamp): Path<DateTime<Utc>>,
) -> ApiResult<Json<HistoryEntry>> {
    let entry = state.services.history.by_timestamp(&owner, timestamp).await?;
    Ok(Json(entry))
}

// ============================================================================
// COLLECTIONS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CollectionQuery {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    name: String,
    #[serde(default)]
    places_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRefRequest {
    place_id: String,
}

pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<CollectionQuery>,
) -> ApiResult<Json<ListResponse<Collection>>> {
    let collections = &state.services.collections;
    let items = match query.name {
        Some(name) => collections.search_by_name(&owner, &name).await?,
        None => collections.list(&owner).await?,
    };
    Ok(Json(items.into()))
}

pub async fn create_collection(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(payload): JsonBody<CollectionRequest>,
) -> ApiResult<(StatusCode, Json<Collection>)> {
    let created = state
        .services
        .collections
        .create(&owner, payload.name, payload.places_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResult<Json<Collection>> {
    let collection = state.services.collections.get(&owner, &id).await?;
    Ok(Json(collection))
}

pub async fn update_collection(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<CollectionRequest>,
) -> ApiResult<Json<Collection>> {
    let updated = state
        .services
        .collections
        .update(&owner, &id, payload.name, payload.places_ids)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResult<Json<Collection>> {
    let deleted = state.services.collections.delete(&owner, &id).await?;
    Ok(Json(deleted))
}

pub async fn add_collection_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<PlaceRefRequest>,
) -> ApiResult<Json<Collection>> {
    let updated = state
        .services
        .collections
        .add_place(&owner, &id, &payload.place_id)
        .await?;
    Ok(Json(updated))
}

pub async fn remove_collection_place(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path((id, place_id)): Path<(String, String)>,
) -> ApiResult<Json<Collection>> {
    let updated = state
        .services
        .collections
        .remove_place(&owner, &id, &place_id)
        .await?;
    Ok(Json(updated))
}

pub async fn clear_collection_places(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResult<Json<Collection>> {
    let updated = state.services.collections.clear_places(&owner, &id).await?;
    Ok(Json(updated))
}

// ============================================================================
// PREFERENCES
// ============================================================================

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<UserPreferences>> {
    let prefs = state.services.preferences.get(&owner).await?;
    Ok(Json(prefs))
}

pub async fn set_preferences(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(prefs): JsonBody<UserPreferences>,
) -> ApiResult<Json<UserPreferences>> {
    let stored = state.services.preferences.set(&owner, prefs).await?;
    Ok(Json(stored))
}

pub async fn patch_preferences(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(patch): JsonBody<PreferencesPatch>,
) -> ApiResult<Json<UserPreferences>> {
    let updated = state.services.preferences.apply(&owner, patch).await?;
    Ok(Json(updated))
}

pub async fn clear_preferences(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.services.preferences.clear(&owner).await?;
    Ok(Json(ClearResponse { cleared }))
}
