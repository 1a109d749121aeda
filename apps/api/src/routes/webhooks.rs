//! Payment provider webhook.
//!
//! ```text
//! raw body + stripe-signature
//!        │
//!        ├── no header ─────────► 400 "Missing signature"
//!        ├── bad signature ─────► 400 "Invalid signature"   (nothing written)
//!        │
//!        ▼
//! SplitService::handle_payment_event
//!        │
//!        ├── failure ───────────► 500 "Webhook handler failed" (provider retries)
//!        └── ok ────────────────► 200 {"received": true}
//! ```

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::providers::payment::SIGNATURE_HEADER;
use crate::providers::ProviderError;
use crate::AppState;

/// `POST /webhooks/payment`
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let event = state
        .payments
        .verify_event(&body, signature)
        .map_err(|e| match e {
            ProviderError::InvalidResponse(reason) => {
                error!(%reason, "Signed webhook payload could not be decoded");
                ApiError::validation("Invalid payload")
            }
            other => other.into(),
        })?;

    state
        .splits()
        .handle_payment_event(event)
        .await
        .map_err(|e| {
            error!(error = %e, "Webhook handler failed");
            ApiError::new(ErrorCode::Internal, "Webhook handler failed")
        })?;

    Ok(Json(json!({ "received": true })))
}
