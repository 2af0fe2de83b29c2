//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::storage::StorageError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient rights.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Payment signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Plan id did not resolve to a purchasable plan.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Blob storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Upstream payment gateway failure.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientCredits { balance, required } => (
                StatusCode::BAD_REQUEST,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            Self::InvalidPlan(plan_id) => (
                StatusCode::BAD_REQUEST,
                "invalid_plan",
                format!("Plan {plan_id} cannot be purchased"),
                None,
            ),
            Self::Storage(msg) => {
                tracing::error!(error = %msg, "Blob storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "A storage error occurred".to_string(),
                    None,
                )
            }
            Self::Gateway(msg) => (StatusCode::BAD_GATEWAY, "gateway_error", msg.clone(), None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<dropgate_store::StoreError> for ApiError {
    fn from(err: dropgate_store::StoreError) -> Self {
        match err {
            dropgate_store::StoreError::NotFound => Self::NotFound("record not found".into()),
            dropgate_store::StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            dropgate_store::StoreError::Database(msg)
            | dropgate_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(location) => {
                Self::NotFound(format!("file not found on disk: {location}"))
            }
            StorageError::Io(e) => Self::Storage(e.to_string()),
        }
    }
}
