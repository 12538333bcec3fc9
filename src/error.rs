//! API error taxonomy and HTTP mapping.
//!
//! Every pipeline stage returns [`ApiError`]; the `IntoResponse` impl is the
//! single place errors are turned into status codes and JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller input missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Referenced parcel does not exist.
    #[error("parcel not found")]
    NotFound,

    /// Fetching an external URL failed or returned non-success.
    #[error("could not fetch source URL: {0}")]
    Fetch(String),

    /// The upstream source is rate limiting us. Passed through verbatim so
    /// callers can back off.
    #[error("upstream source rate limited")]
    RateLimited { body: String },

    /// The completion service errored or returned no usable content.
    #[error("model service error: {0}")]
    Model(String),

    /// Model output was not parseable JSON. Carries the raw text for
    /// diagnosis; there is no safe default judgment to fall back to.
    #[error("model returned invalid JSON")]
    Schema { raw: String },

    /// Blob upload failed. Fatal for passport synthesis: no URL to return.
    #[error("document upload failed: {0}")]
    Storage(String),

    /// A store read/write failed in a position where it must surface.
    #[error("store error: {0}")]
    Store(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Parcel not found" }),
            ),
            ApiError::Fetch(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Could not fetch planning URL: {msg}") }),
            ),
            ApiError::RateLimited { body } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "rate_limited", "body": body }),
            ),
            ApiError::Model(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": format!("Model service error: {msg}") }),
            ),
            ApiError::Schema { raw } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "AI returned invalid JSON", "raw": raw }),
            ),
            ApiError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("Document upload failed: {msg}") }),
            ),
            ApiError::Store(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("Store error: {msg}") }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
