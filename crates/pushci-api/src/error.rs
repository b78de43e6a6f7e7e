//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}

impl From<pushci_core::Error> for ApiError {
    fn from(err: pushci_core::Error) -> Self {
        match err {
            pushci_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<pushci_store::StoreError> for ApiError {
    fn from(err: pushci_store::StoreError) -> Self {
        match err {
            pushci_store::StoreError::NotFound(id) => {
                ApiError::NotFound(format!("Log for job {} not found", id))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
