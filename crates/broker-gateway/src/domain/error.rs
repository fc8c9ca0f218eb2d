//! Broker error taxonomy.
//!
//! Every client-visible failure maps to a distinct HTTP status; engine
//! verdicts are never errors. Store failures refuse service instead of
//! skipping checks.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_store::{RateLimitError, StoreError};

/// Client-visible API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing X-Client-Url header")]
    MissingClientUrl,

    #[error("Invalid URL: {0}")]
    InvalidClientUrl(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session already consumed")]
    SessionConsumed,

    #[error("Invalid session token")]
    InvalidNonce,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingClientUrl | ApiError::InvalidClientUrl(_) | ApiError::InvalidNonce => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::SessionExpired => StatusCode::GONE,
            ApiError::SessionConsumed => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<RateLimitError> for ApiError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Exceeded => ApiError::RateLimited,
            RateLimitError::Unavailable => ApiError::ServiceUnavailable,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(_: StoreError) -> Self {
        ApiError::ServiceUnavailable
    }
}

/// Result type for handler operations.
pub type ApiResult<T> = Result<T, ApiError>;
