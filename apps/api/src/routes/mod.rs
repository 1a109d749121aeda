//! HTTP routes.
//!
//! ```text
//! GET  /health                 database reachable, schema current
//! GET  /splits                 caller's splits            (auth)
//! POST /splits                 create a split             (auth)
//! GET  /splits/{idOrCode}      public split view
//! POST /splits/{idOrCode}      join or claim              (optional auth)
//! POST /splits/{idOrCode}/pay  hosted checkout URL
//! POST /sms/invite             text a participant         (auth, creator)
//! POST /webhooks/payment       provider callback          (signed)
//! ```
//!
//! Bodies are read as raw bytes and parsed here so that malformed JSON
//! always answers `400 {"error": "Invalid JSON"}`.

pub mod sms;
pub mod splits;
pub mod webhooks;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use splitpay_core::validation::validate_identifier_str;
use splitpay_db::migrations::migration_status;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/splits",
            get(splits::list_splits).post(splits::create_split),
        )
        .route(
            "/splits/{id}",
            get(splits::get_split).post(splits::join_split),
        )
        .route("/splits/{id}/pay", post(splits::create_payment_session))
        .route("/sms/invite", post(sms::send_invite))
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        .with_state(state)
}

/// Health check endpoint.
///
/// Unavailable when the database is unreachable or its schema is behind.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.db.health_check().await
        && match migration_status(state.db.pool()).await {
            Ok((total, applied)) if applied < total => {
                warn!(total, applied, "Database schema is behind");
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Migration status unavailable");
                false
            }
        };

    if ready {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Parses a request body as JSON.
pub(crate) fn parse_json(body: &[u8]) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|_| ApiError::validation("Invalid JSON"))
}

/// A top-level field of a JSON body; `Null` when absent or when the body
/// is not an object.
pub(crate) fn field<'a>(body: &'a Value, key: &str) -> &'a Value {
    body.get(key).unwrap_or(&Value::Null)
}

/// Validates a split id or share code taken from the path.
pub(crate) fn split_key(raw: &str) -> ApiResult<String> {
    validate_identifier_str(raw).ok_or_else(|| ApiError::invalid("split ID"))
}
