//! Mapping of store errors onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::storage::BackendError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing owner header")]
    MissingOwner,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingOwner => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => match err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                StoreError::CorruptRecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                StoreError::Backend(BackendError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Backend(BackendError::NotAuthorized(_)) => StatusCode::FORBIDDEN,
            },
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingOwner => "missing_owner",
            ApiError::InvalidBody(_) => "validation",
            ApiError::Store(err) => match err {
                StoreError::NotFound { .. } => "not_found",
                StoreError::InvalidReference(_) => "invalid_reference",
                StoreError::Validation(_) => "validation",
                StoreError::CorruptRecord { .. } => "corrupt_record",
                StoreError::Backend(BackendError::Unavailable(_)) => "backend_unavailable",
                StoreError::Backend(BackendError::NotAuthorized(_)) => "not_authorized",
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
