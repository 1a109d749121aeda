//! Split endpoints.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use super::{field, parse_json, split_key};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiResult};
use crate::services::CreateSplitInput;
use crate::AppState;
use splitpay_core::lifecycle::JoinMode;
use splitpay_core::validation::{
    sanitize_text, validate_identifier, validate_monetary_amount, validate_participant_list,
    validate_percentage, validate_phone,
};
use splitpay_core::{Percentage, DEFAULT_TIP_PERCENT};

/// `GET /splits`
pub async fn list_splits(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Value>> {
    let splits = state.splits().list_my_splits(&identity).await?;
    Ok(Json(json!({ "splits": splits })))
}

/// `POST /splits`
///
/// ```json
/// {
///   "billAmount": 100,
///   "tipPercentage": 20,
///   "platformFee": 0,
///   "restaurantName": "Tacos",
///   "participants": [{ "name": "Ana" }, { "name": "Ben", "phone": "555 123 4567" }]
/// }
/// ```
pub async fn create_split(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = parse_json(&body)?;
    let input = create_split_input(&body)?;

    let created = state.splits().create_split(&identity, input).await?;
    Ok(Json(json!({
        "split": created.split,
        "shareLink": created.share_link,
    })))
}

fn create_split_input(body: &Value) -> ApiResult<CreateSplitInput> {
    let subtotal = validate_monetary_amount(field(body, "billAmount"))
        .filter(|amount| amount.is_positive())
        .ok_or_else(|| ApiError::invalid("bill amount"))?;

    let tip = validate_percentage(field(body, "tipPercentage"))
        .unwrap_or(Percentage::from_whole(DEFAULT_TIP_PERCENT));
    let platform_fee =
        validate_percentage(field(body, "platformFee")).unwrap_or(Percentage::zero());

    let restaurant_name = Some(sanitize_text(field(body, "restaurantName")))
        .filter(|name| !name.is_empty());

    let participants = validate_participant_list(field(body, "participants"))
        .ok_or_else(|| ApiError::invalid("participants data"))?;

    Ok(CreateSplitInput {
        subtotal,
        tip,
        platform_fee,
        restaurant_name,
        participants,
    })
}

/// `GET /splits/{idOrCode}`
pub async fn get_split(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = split_key(&raw)?;
    let split = state.splits().get_split(&key).await?;
    Ok(Json(json!({ "split": split })))
}

/// `POST /splits/{idOrCode}`
///
/// `{"participantId": "..."}` claims a slot, `{"name": "...", "phone": "..."}`
/// adds a participant. `action` defaults to `"join"`.
pub async fn join_split(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    MaybeAuthUser(identity): MaybeAuthUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let key = split_key(&raw)?;
    let body = parse_json(&body)?;

    let action = match field(&body, "action") {
        Value::Null => None,
        value => Some(sanitize_text(value)),
    };
    // An unusable phone is dropped rather than rejected
    let mode = JoinMode::resolve(
        action.as_deref(),
        validate_identifier(field(&body, "participantId")),
        sanitize_text(field(&body, "name")),
        validate_phone(field(&body, "phone")),
    )?;

    let split = state
        .splits()
        .join_split(&key, identity.as_ref(), mode)
        .await?;
    Ok(Json(json!({ "split": split })))
}

/// `POST /splits/{idOrCode}/pay`
pub async fn create_payment_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let key = split_key(&raw)?;
    let body = parse_json(&body)?;
    let participant_id = validate_identifier(field(&body, "participantId"))
        .ok_or_else(|| ApiError::invalid("participant ID"))?;

    let checkout_url = state
        .splits()
        .create_payment_session(&key, &participant_id)
        .await?;
    Ok(Json(json!({ "checkoutUrl": checkout_url })))
}
