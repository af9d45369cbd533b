//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tabletop_core::{StoreError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Sync(SyncError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Sync(SyncError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Sync(SyncError::StaleReference { .. }) => StatusCode::CONFLICT,
            ApiError::Sync(SyncError::Store(StoreError::Conflict(_))) => StatusCode::CONFLICT,
            ApiError::Sync(SyncError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = Json(json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(SyncError::NotFound("game".into())), StatusCode::NOT_FOUND),
            (
                ApiError::from(SyncError::InvalidArgument("sides".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(SyncError::Store(StoreError::Conflict("dup".into()))),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(SyncError::Store(StoreError::Other("lock".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Upload("no files".into()), StatusCode::BAD_REQUEST),
            (ApiError::Internal("task panicked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
