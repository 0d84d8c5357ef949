//! HTTP interface over the feature services.
//!
//! Authentication happens upstream; the authenticated user id arrives in the
//! `x-owner-id` header and every `/api/me/...` route operates on that owner.

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::features::ProfileServices;
use handlers::*;

/// Header carrying the authenticated owner id
pub const OWNER_HEADER: &str = "x-owner-id";

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Shared application state
pub struct AppState {
    /// Feature services over the configured backend
    pub services: ProfileServices,
    /// Backend name reported by the health check
    pub backend_name: String,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(services: ProfileServices, backend_name: impl Into<String>) -> Self {
        Self {
            services,
            backend_name: backend_name.into(),
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// OWNER EXTRACTION
// ============================================================================

/// Owner id taken from the request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(|owner| Owner(owner.to_string()))
            .ok_or(ApiError::MissingOwner)
    }
}

/// JSON request body; malformed bodies are rejected with the API error shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

// ============================================================================
// ROUTER
// ============================================================================

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Favorite places
        .route(
            "/api/me/favorite-places",
            get(list_favorite_places)
                .post(add_favorite_place)
                .delete(clear_favorite_places),
        )
        .route("/api/me/favorite-places/rollback", post(rollback_favorite_place))
        .route(
            "/api/me/favorite-places/:establishment_id",
            get(get_favorite_place)
                .put(update_favorite_place)
                .delete(remove_favorite_place),
        )
        // Favorite prompts
        .route(
            "/api/me/favorite-prompts",
            get(list_favorite_prompts)
                .post(add_favorite_prompt)
                .delete(clear_favorite_prompts),
        )
        .route(
            "/api/me/favorite-prompts/:prompt_id",
            get(get_favorite_prompt)
                .put(update_favorite_prompt)
                .delete(remove_favorite_prompt),
        )
        // History
        .route(
            "/api/me/history",
            get(list_history).post(record_history).delete(clear_history),
        )
        .route("/api/me/history/rollback", post(rollback_history))
        .route("/api/me/history/rollback-range", post(rollback_history_range))
        .route("/api/me/history/at/:timestamp", get(history_at))
        // Collections
        .route(
            "/api/me/collections",
            get(list_collections).post(create_collection),
        )
        .route(
            "/api/me/collections/:id",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
        .route(
            "/api/me/collections/:id/places",
            post(add_collection_place).delete(clear_collection_places),
        )
        .route(
            "/api/me/collections/:id/places/:place_id",
            delete(remove_collection_place),
        )
        // Preferences
        .route(
            "/api/me/preferences",
            get(get_preferences)
                .put(set_preferences)
                .patch(patch_preferences)
                .delete(clear_preferences),
        )
        .with_state(state)
}
