//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"success": false, "error": "message"}`.

use crate::geocoder::GeocodeError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use devcamper_core::model::ModelError;
use devcamper_core::storage::StoreError;
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// Each variant maps to an HTTP status code:
/// - `NotFound` → 404
/// - `BadRequest` → 400
/// - `Unauthorized` → 401
/// - `Forbidden` → 403
/// - `Conflict` → 409
/// - `PayloadTooLarge` → 413
/// - `BadGateway` → 502
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found, or a malformed id (404).
    NotFound(String),
    /// Invalid request body or failed validation (400).
    BadRequest(String),
    /// Missing or invalid credentials (401).
    Unauthorized(String),
    /// Authenticated, but the role may not use this route (403).
    Forbidden(String),
    /// Unique field already taken (409).
    Conflict(String),
    /// Upload larger than the configured limit (413).
    PayloadTooLarge(String),
    /// Geocoder unreachable or misbehaving (502).
    BadGateway(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, .. } => {
                ApiError::Conflict(format!("Duplicate field value entered: {field}"))
            }
            StoreError::NotFound(id) => {
                ApiError::NotFound(format!("Resource not found with id of {id}"))
            }
            other => {
                tracing::error!("Store error: {}", other);
                ApiError::Internal("Server Error".into())
            }
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        tracing::error!("Geocoder error: {}", err);
        ApiError::BadGateway("Geocoder unavailable".into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(ApiError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ApiError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(ApiError::PayloadTooLarge("x".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_of(ApiError::BadGateway("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_store_error_mapping() {
        let dup = StoreError::Duplicate {
            field: "name".into(),
            value: "Devworks".into(),
        };
        assert!(matches!(ApiError::from(dup), ApiError::Conflict(_)));
        assert!(matches!(
            ApiError::from(StoreError::NotFound(Uuid::new_v4())),
            ApiError::NotFound(_)
        ));
        match ApiError::from(StoreError::UnknownCollection("users".into())) {
            ApiError::Internal(msg) => assert!(!msg.contains("users")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validation_becomes_bad_request() {
        let err = ModelError::Validation(vec!["Please add a name".into()]);
        match ApiError::from(err) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "Please add a name"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
