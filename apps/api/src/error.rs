//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in SplitPay                               │
//! │                                                                         │
//! │  Handler: Result<Json<T>, ApiError>                                     │
//! │         │                                                               │
//! │         ├── ValidationError ──► 400 "Invalid bill amount"               │
//! │         ├── CoreError ────────► 400 / 403 / 404 per variant             │
//! │         ├── DbError ──────────► logged ──► 500 "Something went wrong"   │
//! │         ├── ProviderError ────► logged ──► 502 / 401 / 400              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  IntoResponse: status code + {"error": "<message>"}                     │
//! │                                                                         │
//! │  Internal details never reach the client; they go to the log.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::providers::ProviderError;
use splitpay_core::{CoreError, ValidationError};
use splitpay_db::DbError;

/// Generic message for anything the client can't act on.
const INTERNAL_MESSAGE: &str = "Something went wrong";

/// API error returned from handlers.
///
/// ## Response Body
/// ```json
/// { "error": "Split not found" }
/// ```
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Category, decides the status code
    pub code: ErrorCode,

    /// Human-readable message for the client
    pub message: String,
}

/// Error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Input validation failed (400)
    Validation,

    /// Missing or invalid credentials (401)
    Unauthorized,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// Resource not found (404)
    NotFound,

    /// Split is full (400)
    Capacity,

    /// Participant already paid (400)
    AlreadyPaid,

    /// Webhook signature missing or invalid (400)
    Signature,

    /// Payment or messaging provider failed (502)
    Upstream,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this category.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Validation
            | ErrorCode::Capacity
            | ErrorCode::AlreadyPaid
            | ErrorCode::Signature => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error (400).
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Validation, message)
    }

    /// 400 "Invalid {field}".
    pub fn invalid(field: &str) -> Self {
        ApiError::validation(ValidationError::invalid(field).to_string())
    }

    /// 401 "Unauthorized".
    pub fn unauthorized() -> Self {
        ApiError::new(ErrorCode::Unauthorized, "Unauthorized")
    }

    /// Creates a not found error (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NotFound, message)
    }

    /// 500 with the generic message.
    pub fn internal() -> Self {
        ApiError::new(ErrorCode::Internal, INTERNAL_MESSAGE)
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Converts database errors to API errors.
///
/// Every database failure is a 500 to the client; the detail is logged.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
                tracing::error!(error = %err, "Database unavailable");
            }
            _ => {
                tracing::error!(error = %err, "Database operation failed");
            }
        }
        ApiError::internal()
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::SplitNotFound(_) | CoreError::ParticipantNotFound(_) => {
                ApiError::not_found(message)
            }
            CoreError::Forbidden { reason } => {
                tracing::warn!(%reason, "Forbidden");
                ApiError::new(ErrorCode::Forbidden, message)
            }
            CoreError::CapacityReached { .. } => ApiError::new(ErrorCode::Capacity, message),
            CoreError::AlreadyPaid { .. } => ApiError::new(ErrorCode::AlreadyPaid, message),
            CoreError::InvalidPaymentAmount { reason } => {
                tracing::warn!(%reason, "Share rejected for checkout");
                ApiError::validation(message)
            }
            CoreError::PaymentsRecorded { .. }
            | CoreError::ShareChanged { .. }
            | CoreError::InvalidShares { .. }
            | CoreError::Validation(_) => ApiError::validation(message),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts provider errors to API errors.
impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidToken(reason) => {
                tracing::debug!(%reason, "Bearer token rejected");
                ApiError::unauthorized()
            }
            ProviderError::MissingSignature => {
                ApiError::new(ErrorCode::Signature, "Missing signature")
            }
            ProviderError::InvalidSignature(reason) => {
                tracing::warn!(%reason, "Webhook signature verification failed");
                ApiError::new(ErrorCode::Signature, "Invalid signature")
            }
            other => {
                tracing::error!(error = %other, "Provider call failed");
                ApiError::new(ErrorCode::Upstream, INTERNAL_MESSAGE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message }))).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
