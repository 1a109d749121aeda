//! # Hosted Checkout Provider
//!
//! Stripe-compatible checkout sessions and webhook verification.
//!
//! ## Checkout Flow
//! ```text
//! ┌──────────┐  POST /splits/{id}/pay   ┌──────────┐  POST /v1/checkout/sessions  ┌──────────┐
//! │  Client  │ ───────────────────────► │ SplitPay │ ───────────────────────────► │ Provider │
//! │          │ ◄─────── checkoutUrl ─── │          │ ◄────────── {id, url} ────── │          │
//! └────┬─────┘                          └────▲─────┘                              └────┬─────┘
//!      │          hosted payment page        │   POST /webhooks/payment (signed)       │
//!      └─────────────────────────────────────┼─────────────────────────────────────────┘
//!                                            │
//! ```
//!
//! ## Webhook Signature
//! Header `stripe-signature: t=<unix>,v1=<hex>` where the hex digest is
//! HMAC-SHA256 of `"{t}.{raw body}"` under the webhook secret. Events older
//! or newer than [`SIGNATURE_TOLERANCE_SECS`] are rejected.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

use super::{
    CheckoutRequest, CheckoutSession, PaymentEvent, PaymentProvider, ProviderError,
    ProviderResult,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum clock skew accepted on a webhook timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Upper bound on one provider call. Checkout runs while the split is
/// locked, so this also bounds how long other writers to the split wait.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Checkout provider speaking the Stripe REST API.
pub struct CheckoutPaymentProvider {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
}

impl CheckoutPaymentProvider {
    /// Creates the provider.
    ///
    /// Without a secret key, checkout fails with
    /// [`ProviderError::NotConfigured`]. Without a webhook secret every event
    /// is rejected.
    pub fn new(
        api_base: impl Into<String>,
        secret_key: Option<String>,
        webhook_secret: Option<String>,
    ) -> ProviderResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(CheckoutPaymentProvider {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentProvider for CheckoutPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ProviderResult<CheckoutSession> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("payment_secret_key"))?;

        let form = checkout_form(request);
        debug!(
            split_id = %request.split_id,
            participant_id = %request.participant_id,
            amount_cents = request.amount.cents(),
            "Creating checkout session"
        );

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| ProviderError::InvalidResponse("session has no url".to_string()))?;

        info!(
            split_id = %request.split_id,
            participant_id = %request.participant_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ProviderResult<PaymentEvent> {
        let signature = signature.ok_or(ProviderError::MissingSignature)?;
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidSignature("no webhook secret".to_string()))?;

        verify_signature(
            secret,
            payload,
            signature,
            chrono::Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

/// Form body for `POST /v1/checkout/sessions`.
///
/// Metadata goes on the session and on the payment intent so that both
/// completion and failure events can be traced back to the participant.
fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount.cents().to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            request.product_name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            request.description.clone(),
        ),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("metadata[splitId]", request.split_id.clone()),
        ("metadata[participantId]", request.participant_id.clone()),
        (
            "payment_intent_data[metadata][splitId]",
            request.split_id.clone(),
        ),
        (
            "payment_intent_data[metadata][participantId]",
            request.participant_id.clone(),
        ),
    ]
}

// =============================================================================
// Signatures
// =============================================================================

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> ProviderResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProviderError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a signature header value for `payload` at `timestamp`.
///
/// Used by tests and local tooling to produce events the server accepts.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> ProviderResult<String> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks a signature header against the payload.
///
/// Any one matching `v1` entry is enough; the provider sends several while a
/// secret is being rolled.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> ProviderResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ProviderError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(ProviderError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ProviderError::InvalidSignature(format!(
            "timestamp {} outside tolerance",
            timestamp
        )));
    }

    let matched = candidates.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        signing_mac(secret, timestamp, payload)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(ProviderError::InvalidSignature(
            "no matching signature".to_string(),
        ))
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
    /// A string id, or an expanded object when the caller asked for one.
    #[serde(default)]
    payment_intent: Option<serde_json::Value>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl EventObject {
    fn payment_intent_id(&self) -> Option<String> {
        match self.payment_intent.as_ref()? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Object(obj) => obj.get("id")?.as_str().map(str::to_string),
            _ => None,
        }
    }

    fn meta(&self, key: &str) -> Option<String> {
        self.metadata.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

fn parse_event(payload: &[u8]) -> ProviderResult<PaymentEvent> {
    let event: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid event payload: {}", e)))?;

    let object = event.data.object;
    Ok(match event.kind.as_str() {
        "checkout.session.completed" => PaymentEvent::CheckoutCompleted {
            payment_intent_id: object.payment_intent_id(),
            split_id: object.meta("splitId"),
            participant_id: object.meta("participantId"),
            session_id: object.id,
        },
        "payment_intent.payment_failed" => PaymentEvent::PaymentFailed {
            split_id: object.meta("splitId"),
            participant_id: object.meta("participantId"),
            payment_intent_id: object.id,
        },
        _ => PaymentEvent::Other { kind: event.kind },
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
