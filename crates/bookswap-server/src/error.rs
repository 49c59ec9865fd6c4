use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use bookswap_store::StoreError;

/// Failure taxonomy of the HTTP surface.
///
/// Every business-rule violation maps onto one of these categories before it
/// leaves a handler; the message names the violated rule in plain language.
/// `Internal` is the only variant whose message is withheld from the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("Record not found".to_string()),
            StoreError::DuplicateEmail => {
                ApiError::Conflict("Email is already registered".to_string())
            }
            StoreError::OwnershipDrift => ApiError::Conflict(
                "Ownership changed since the request was created. Please retry.".to_string(),
            ),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
