//! API-boundary error type.
//!
//! Components surface failures as values; this enum is the single place
//! they are mapped to HTTP statuses and `{"error": ...}` bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::timing::TimingError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// Bad signature, wrong mode, or expired token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Caller is not a participant of the match it addresses.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Timing policy violation; carries the specific reason.
    #[error("{0}")]
    Timing(TimingError),

    /// Duplicate submission, full match, match not joinable.
    #[error("{0}")]
    Conflict(String),

    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Timing(TimingError::TokenExpired) | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Timing(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(ref e) = self {
            // Full context stays server-side; the client gets a generic message
            tracing::error!("store failure: {}", e);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<TimingError> for ApiError {
    fn from(e: TimingError) -> Self {
        ApiError::Timing(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Forbidden("nope".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::RateLimited {
                retry_after_secs: 7
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Store(StoreError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_timing_reasons_are_visible() {
        let e: ApiError = TimingError::TooEarly.into();
        assert_eq!(e.to_string(), "too early");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        // An expired token is an auth failure, but keeps its reason string
        let e: ApiError = TimingError::TokenExpired.into();
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.to_string(), "token expired");
    }

    #[test]
    fn test_retry_hint_embedded_in_message() {
        let e = ApiError::RateLimited {
            retry_after_secs: 7,
        };
        assert!(e.to_string().contains("7"));
    }
}
