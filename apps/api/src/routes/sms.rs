//! SMS invite endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::{field, parse_json};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use splitpay_core::validation::validate_identifier;

/// `POST /sms/invite` with `{"splitId": "...", "participantId": "..."}`
///
/// `delivered` is false when the messaging provider refused the message;
/// the attempt is still logged.
pub async fn send_invite(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = parse_json(&body)?;

    let (Some(split_id), Some(participant_id)) = (
        validate_identifier(field(&body, "splitId")),
        validate_identifier(field(&body, "participantId")),
    ) else {
        return Err(ApiError::validation("Invalid request"));
    };

    let delivered = state
        .splits()
        .send_invite(&identity, &split_id, &participant_id)
        .await?;

    Ok(Json(json!({ "success": true, "delivered": delivered })))
}
