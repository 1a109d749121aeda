//! # SMS Provider
//!
//! Twilio-compatible message sending, with a logging stand-in for
//! environments that have no messaging credentials.
//!
//! ```text
//! AppConfig ──► messaging_from_config()
//!                   │
//!                   ├── sid + token + from number ──► SmsMessagingProvider
//!                   │                                  POST /2010-04-01/Accounts/{sid}/Messages.json
//!                   │
//!                   └── anything missing ───────────► LoggingMessagingProvider
//!                                                      logs the message, returns "mock-sid"
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::{MessagingProvider, ProviderError, ProviderResult};
use crate::config::AppConfig;

/// Message id returned when no real provider is configured.
pub const MOCK_MESSAGE_ID: &str = "mock-sid";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Picks the messaging provider for this configuration.
pub fn messaging_from_config(config: &AppConfig) -> ProviderResult<Arc<dyn MessagingProvider>> {
    match (
        &config.messaging_account_sid,
        &config.messaging_auth_token,
        &config.messaging_from_number,
    ) {
        (Some(sid), Some(token), Some(from)) => Ok(Arc::new(SmsMessagingProvider::new(
            &config.messaging_api_base,
            sid,
            token,
            from,
        )?)),
        _ => {
            warn!("Messaging credentials not configured, SMS invites will only be logged");
            Ok(Arc::new(LoggingMessagingProvider))
        }
    }
}

// =============================================================================
// HTTP Provider
// =============================================================================

/// Sends SMS through the Twilio REST API.
pub struct SmsMessagingProvider {
    client: Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsMessagingProvider {
    pub fn new(
        api_base: &str,
        account_sid: &str,
        auth_token: &str,
        from_number: &str,
    ) -> ProviderResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(SmsMessagingProvider {
            client,
            endpoint: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                api_base.trim_end_matches('/'),
                account_sid
            ),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[async_trait]
impl MessagingProvider for SmsMessagingProvider {
    async fn send_sms(&self, to: &str, body: &str) -> ProviderResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
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

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        info!(message_id = %message.sid, "SMS sent");
        Ok(message.sid)
    }
}

// =============================================================================
// Logging Stand-in
// =============================================================================

/// Logs instead of sending. Always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMessagingProvider;

#[async_trait]
impl MessagingProvider for LoggingMessagingProvider {
    async fn send_sms(&self, to: &str, body: &str) -> ProviderResult<String> {
        info!(to = %to, message = %body, "SMS (not sent, messaging not configured)");
        Ok(MOCK_MESSAGE_ID.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Sent = Arc<Mutex<Vec<(String, HashMap<String, String>, Option<String>)>>>;

    async fn fake_messages(
        State(sent): State<Sent>,
        Path(account): Path<String>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        sent.lock().unwrap().push((account, form, auth));
        Json(json!({ "sid": "SM123", "status": "queued" }))
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_send_sms() {
        let sent: Sent = Arc::default();
        let router = Router::new()
            .route(
                "/2010-04-01/Accounts/{account}/Messages.json",
                post(fake_messages),
            )
            .with_state(sent.clone());
        let base = serve(router).await;

        let provider = SmsMessagingProvider::new(&base, "AC1", "tok", "+15550000000").unwrap();
        let id = provider.send_sms("+15551234567", "Hey Ben!").await.unwrap();
        assert_eq!(id, "SM123");

        let sent = sent.lock().unwrap();
        let (account, form, auth) = &sent[0];
        assert_eq!(account, "AC1");
        assert_eq!(form["To"], "+15551234567");
        assert_eq!(form["From"], "+15550000000");
        assert_eq!(form["Body"], "Hey Ben!");
        // "AC1:tok" in base64
        assert_eq!(auth.as_deref(), Some("Basic QUMxOnRvaw=="));
    }

    #[tokio::test]
    async fn test_send_sms_rejected() {
        let router = Router::new().route(
            "/2010-04-01/Accounts/{account}/Messages.json",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({ "code": 21211 }))) }),
        );
        let base = serve(router).await;

        let provider = SmsMessagingProvider::new(&base, "AC1", "tok", "+15550000000").unwrap();
        let err = provider.send_sms("123", "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_logging_provider() {
        let id = LoggingMessagingProvider
            .send_sms("+15551234567", "hi")
            .await
            .unwrap();
        assert_eq!(id, MOCK_MESSAGE_ID);
    }
}
