//! End-to-end tests of the HTTP API.
//!
//! Each test serves the real router on an ephemeral port with in-process
//! payment and messaging providers. Most run over an in-memory database;
//! the concurrency tests use a temporary SQLite file.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use splitpay_api::auth::JwtIdentityProvider;
use splitpay_api::providers::payment::{sign_payload, SIGNATURE_HEADER};
use splitpay_api::providers::{
    CheckoutPaymentProvider, CheckoutRequest, CheckoutSession, Identity, MessagingProvider,
    PaymentEvent, PaymentProvider, ProviderError, ProviderResult,
};
use splitpay_api::{router, AppConfig, AppState};
use splitpay_db::{Database, DbConfig};

const JWT_SECRET: &str = "test-jwt-secret";
const WEBHOOK_SECRET: &str = "whsec_test";
const BASE_URL: &str = "https://split.test";

// =============================================================================
// Fakes
// =============================================================================

/// Hands out numbered sessions, after `delay`; verifies webhooks with the
/// real verifier.
struct FakePayments {
    requests: Mutex<Vec<CheckoutRequest>>,
    delay: Duration,
    verifier: CheckoutPaymentProvider,
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ProviderResult<CheckoutSession> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: format!("https://checkout.test/cs_test_{}", n),
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ProviderResult<PaymentEvent> {
        self.verifier.verify_event(payload, signature)
    }
}

#[derive(Default)]
struct FakeMessaging {
    sent: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

#[async_trait]
impl MessagingProvider for FakeMessaging {
    async fn send_sms(&self, to: &str, body: &str) -> ProviderResult<String> {
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Rejected {
                status: 400,
                body: "unreachable number".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SM{}", sent.len()))
    }
}

// =============================================================================
// Harness
// =============================================================================

struct TestApp {
    base: String,
    client: reqwest::Client,
    db: Database,
    payments: Arc<FakePayments>,
    messaging: Arc<FakeMessaging>,
    jwt: JwtIdentityProvider,
    _dir: Option<tempfile::TempDir>,
}

impl TestApp {
    async fn spawn() -> TestApp {
        Self::spawn_with(DbConfig::in_memory(), None, Duration::ZERO).await
    }

    /// A file-backed database, so concurrent requests get their own
    /// connections.
    async fn spawn_on_file(busy_timeout: Duration, checkout_delay: Duration) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("splitpay.db")).busy_timeout(busy_timeout);
        Self::spawn_with(config, Some(dir), checkout_delay).await
    }

    async fn spawn_with(
        db_config: DbConfig,
        dir: Option<tempfile::TempDir>,
        checkout_delay: Duration,
    ) -> TestApp {
        let db = Database::new(db_config).await.unwrap();
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            app_base_url: BASE_URL.to_string(),
            payment_secret_key: None,
            payment_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            payment_api_base: "http://unused".to_string(),
            messaging_account_sid: None,
            messaging_auth_token: None,
            messaging_from_number: None,
            messaging_api_base: "http://unused".to_string(),
            auth_jwt_secret: JWT_SECRET.to_string(),
        };

        let payments = Arc::new(FakePayments {
            requests: Mutex::new(Vec::new()),
            delay: checkout_delay,
            verifier: CheckoutPaymentProvider::new(
                "http://unused",
                None,
                Some(WEBHOOK_SECRET.to_string()),
            )
            .unwrap(),
        });
        let messaging = Arc::new(FakeMessaging::default());

        let state = AppState {
            db: db.clone(),
            config: Arc::new(config),
            identity: Arc::new(JwtIdentityProvider::new(JWT_SECRET)),
            payments: payments.clone(),
            messaging: messaging.clone(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        TestApp {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            db,
            payments,
            messaging,
            jwt: JwtIdentityProvider::new(JWT_SECRET),
            _dir: dir,
        }
    }

    fn token(&self, subject: &str, name: &str) -> String {
        self.jwt
            .issue_token(
                &Identity {
                    subject: subject.to_string(),
                    name: Some(name.to_string()),
                    email: None,
                    phone: None,
                },
                3600,
            )
            .unwrap()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self.client.post(format!("{}{}", self.base, path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn webhook(&self, payload: Value) -> (StatusCode, Value) {
        let body = serde_json::to_vec(&payload).unwrap();
        let signature =
            sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &body).unwrap();
        let response = self
            .client
            .post(format!("{}/webhooks/payment", self.base))
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    /// Ana creates a $100 bill with a 20% tip for four people.
    async fn create_dinner(&self, ana: &str) -> Value {
        let (status, body) = self
            .post(
                "/splits",
                Some(ana),
                json!({
                    "billAmount": 100,
                    "tipPercentage": 20,
                    "restaurantName": "Taqueria <b>Luna</b>",
                    "participants": [
                        { "name": "Ana" },
                        { "name": "Ben", "phone": "(555) 123-4567" },
                        { "name": "Cy" },
                        { "name": "Dee", "phone": "+1 555 987 6543" }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

fn completed_event(split_id: &str, participant_id: &str, session_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_intent": format!("pi_{}", session_id),
            "metadata": { "splitId": split_id, "participantId": participant_id }
        }}
    })
}

fn participant_ids(split: &Value) -> Vec<String> {
    split["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_unavailable_when_schema_behind() {
    let app = TestApp::spawn().await;
    sqlx::query("DELETE FROM _sqlx_migrations")
        .execute(app.db.pool())
        .await
        .unwrap();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_create_split_equal_shares() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");

    let body = app.create_dinner(&ana).await;
    let split = &body["split"];

    assert_eq!(split["totalAmount"], "120.00");
    assert_eq!(split["tipPercentage"], 20);
    assert_eq!(split["status"], "COLLECTING");
    assert_eq!(split["restaurantName"], "Taqueria Luna");

    let participants = split["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 4);
    assert!(participants.iter().all(|p| p["amount"] == "30.00"));
    assert!(participants.iter().all(|p| p["status"] == "PENDING"));
    assert_eq!(participants[1]["phone"], "5551234567");
    assert_eq!(participants[3]["phone"], "+15559876543");
    // The creator's own row is linked to them
    assert!(participants[0]["userId"].is_string());
    assert!(participants[1].get("userId").is_none());

    let code = split["shareCode"].as_str().unwrap();
    assert_eq!(body["shareLink"], format!("{}/join/{}", BASE_URL, code));
}

#[tokio::test]
async fn test_create_split_custom_amounts() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");

    let (status, body) = app
        .post(
            "/splits",
            Some(&ana),
            json!({
                "billAmount": "50",
                "tipPercentage": 0,
                "participants": [
                    { "name": "Ana", "amount": 20 },
                    { "name": "Ben" },
                    { "name": "Cy" },
                    { "name": "Dee" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let amounts: Vec<&str> = body["split"]["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["amount"].as_str().unwrap())
        .collect();
    assert_eq!(amounts, ["20.00", "10.00", "10.00", "10.00"]);
}

#[tokio::test]
async fn test_create_split_validation() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");

    let (status, body) = app
        .post("/splits", None, json!({ "billAmount": 10, "participants": [{ "name": "A" }] }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = app
        .post(
            "/splits",
            Some(&ana),
            json!({ "billAmount": -5, "participants": [{ "name": "A" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid bill amount");

    let (status, body) = app
        .post(
            "/splits",
            Some(&ana),
            json!({ "billAmount": 10, "participants": [{ "name": "A", "phone": "12" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid participants data");

    // Custom amounts above the total cannot be reconciled
    let (status, _) = app
        .post(
            "/splits",
            Some(&ana),
            json!({ "billAmount": 10, "tipPercentage": 0, "participants": [{ "name": "A", "amount": 11 }, { "name": "B" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(format!("{}/splits", app.base))
        .bearer_auth(&ana)
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_invalid_token_rejected_even_where_optional() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let code = created["split"]["shareCode"].as_str().unwrap();

    let (status, _) = app.get("/splits", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(&format!("/splits/{}", code), Some("not-a-token"), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_split_by_code_hides_phones() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let code = created["split"]["shareCode"].as_str().unwrap();

    let (status, body) = app.get(&format!("/splits/{}", code), None).await;
    assert_eq!(status, StatusCode::OK);

    let split = &body["split"];
    assert_eq!(split["id"], created["split"]["id"]);
    assert_eq!(split["creator"]["name"], "Ana");
    assert_eq!(split["collectedAmount"], "0.00");
    for p in split["participants"].as_array().unwrap() {
        assert!(p.get("phone").is_none());
    }

    let (status, body) = app.get("/splits/bad.id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid split ID");

    let (status, body) = app.get("/splits/doesnotexist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Split not found");
}

#[tokio::test]
async fn test_list_my_splits() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let first = app.create_dinner(&ana).await;
    let second = app.create_dinner(&ana).await;

    let (status, body) = app.get("/splits", Some(&ana)).await;
    assert_eq!(status, StatusCode::OK);

    let splits = body["splits"].as_array().unwrap();
    assert_eq!(splits.len(), 2);
    assert_eq!(splits[0]["id"], second["split"]["id"]);
    assert_eq!(splits[1]["id"], first["split"]["id"]);
    assert_eq!(splits[0]["participants"].as_array().unwrap().len(), 4);
    assert!(splits[0]["participants"][1].get("phone").is_none());

    let ben = app.token("user_ben", "Ben");
    let (_, body) = app.get("/splits", Some(&ben)).await;
    assert!(body["splits"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_join_as_new_participant_reshares() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let code = created["split"]["shareCode"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/splits/{}", code),
            None,
            json!({ "action": "join", "name": "Eve", "phone": "nope" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let participants = body["split"]["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 5);
    assert!(participants.iter().all(|p| p["amount"] == "24.00"));
    assert_eq!(participants[4]["name"], "Eve");
    assert_eq!(participants[4]["status"], "JOINED");
    assert_eq!(body["split"]["totalAmount"], "120.00");
}

#[tokio::test]
async fn test_join_claim_and_view() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap();
    let ids = participant_ids(&created["split"]);

    let ben = app.token("user_ben", "Ben");
    let (status, body) = app
        .post(
            &format!("/splits/{}", split_id),
            Some(&ben),
            json!({ "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["split"]["participants"][1]["status"], "JOINED");

    let participants = app.db.splits().participants(split_id).await.unwrap();
    assert!(participants[1].user_id.is_some());

    // Neither id nor name: the split comes back unchanged
    let (status, body) = app
        .post(&format!("/splits/{}", split_id), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["split"]["participants"].as_array().unwrap().len(), 4);

    let (status, body) = app
        .post(
            &format!("/splits/{}", split_id),
            None,
            json!({ "participantId": "nobody" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Participant not found");

    let (status, body) = app
        .post(
            &format!("/splits/{}", split_id),
            None,
            json!({ "action": "leave", "name": "Eve" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");
}

#[tokio::test]
async fn test_send_invite() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap();
    let code = created["split"]["shareCode"].as_str().unwrap();
    let ids = participant_ids(&created["split"]);

    let (status, body) = app
        .post(
            "/sms/invite",
            Some(&ana),
            json!({ "splitId": split_id, "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, json!({ "success": true, "delivered": true }));

    {
        let sent = app.messaging.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5551234567");
        assert_eq!(
            sent[0].1,
            format!(
                "Hey Ben! Ana invited you to split a bill at Taqueria Luna. Your share is $30.00. Pay here: {}/join/{}",
                BASE_URL, code
            )
        );
    }

    let participants = app.db.splits().participants(split_id).await.unwrap();
    assert_eq!(participants[1].status.as_str(), "INVITED");

    let logs = app.db.sms_logs().list_for_split(split_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].provider_message_id.as_deref(), Some("SM1"));
}

#[tokio::test]
async fn test_send_invite_rules() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap();
    let ids = participant_ids(&created["split"]);

    // Not the creator: nothing is sent
    let ben = app.token("user_ben", "Ben");
    let (status, body) = app
        .post(
            "/sms/invite",
            Some(&ben),
            json!({ "splitId": split_id, "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Unauthorized");
    assert!(app.messaging.sent.lock().unwrap().is_empty());

    // Cy has no phone
    let (status, body) = app
        .post(
            "/sms/invite",
            Some(&ana),
            json!({ "splitId": split_id, "participantId": ids[2] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Participant has no phone number");

    let (status, body) = app
        .post("/sms/invite", Some(&ana), json!({ "splitId": split_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");

    let (status, _) = app
        .post(
            "/sms/invite",
            None,
            json!({ "splitId": split_id, "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_invite_provider_failure_is_logged() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap();
    let ids = participant_ids(&created["split"]);

    *app.messaging.fail.lock().unwrap() = true;
    let (status, body) = app
        .post(
            "/sms/invite",
            Some(&ana),
            json!({ "splitId": split_id, "participantId": ids[3] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], false);

    let participants = app.db.splits().participants(split_id).await.unwrap();
    assert_eq!(participants[3].status.as_str(), "PENDING");

    let logs = app.db.sms_logs().list_for_split(split_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, splitpay_core::SmsStatus::Failed);
}

#[tokio::test]
async fn test_pay_and_settle() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let code = created["split"]["shareCode"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);

    // Checkout for Ben, addressed by share code
    let (status, body) = app
        .post(
            &format!("/splits/{}/pay", code),
            None,
            json!({ "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["checkoutUrl"], "https://checkout.test/cs_test_1");

    {
        let requests = app.payments.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.amount.cents(), 3_000);
        assert_eq!(request.product_name, "Split: Taqueria Luna");
        assert_eq!(request.cancel_url, format!("{}/join/{}?cancelled=true", BASE_URL, code));
        assert!(request
            .success_url
            .starts_with(&format!("{}/split/success?session_id={{CHECKOUT_SESSION_ID}}", BASE_URL)));
    }

    let (status, body) = app
        .webhook(completed_event(&split_id, &ids[1], "cs_test_1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    // Redelivery changes nothing
    let (status, _) = app
        .webhook(completed_event(&split_id, &ids[1], "cs_test_1"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/splits/{}", code), None).await;
    assert_eq!(body["split"]["participants"][1]["status"], "PAID");
    assert!(body["split"]["participants"][1]["paidAt"].is_string());
    assert_eq!(body["split"]["collectedAmount"], "30.00");
    assert_eq!(body["split"]["status"], "COLLECTING");

    // A paid share cannot be checked out again
    let (status, body) = app
        .post(
            &format!("/splits/{}/pay", split_id),
            None,
            json!({ "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Already paid");

    // Membership is frozen once money has moved
    let (status, _) = app
        .post(&format!("/splits/{}", code), None, json!({ "name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Everyone else pays; the last payment completes the split
    for id in [&ids[0], &ids[2], &ids[3]] {
        let session = format!("cs_{}", id);
        let (status, _) = app.webhook(completed_event(&split_id, id, &session)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get(&format!("/splits/{}", code), None).await;
    assert_eq!(body["split"]["status"], "COMPLETED");
    assert_eq!(body["split"]["collectedAmount"], "120.00");
}

#[tokio::test]
async fn test_completed_webhook_without_metadata_uses_session() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);

    app.post(
        &format!("/splits/{}/pay", split_id),
        None,
        json!({ "participantId": ids[2] }),
    )
    .await;

    let (status, _) = app
        .webhook(json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_1", "payment_intent": "pi_1" } }
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert!(participants[2].is_paid());
    assert_eq!(participants[2].payment_intent_id.as_deref(), Some("pi_1"));
}

#[tokio::test]
async fn test_failed_payment_webhook() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);

    app.post(
        &format!("/splits/{}/pay", split_id),
        None,
        json!({ "participantId": ids[1] }),
    )
    .await;

    let failed = |participant_id: &str| {
        json!({
            "type": "payment_intent.payment_failed",
            "data": { "object": {
                "id": "pi_declined",
                "metadata": { "splitId": split_id, "participantId": participant_id }
            }}
        })
    };

    // Ben has a checkout session: FAILED
    let (status, _) = app.webhook(failed(&ids[1])).await;
    assert_eq!(status, StatusCode::OK);
    // Cy never started checkout: unchanged
    let (status, _) = app.webhook(failed(&ids[2])).await;
    assert_eq!(status, StatusCode::OK);

    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert_eq!(participants[1].status.as_str(), "FAILED");
    assert_eq!(participants[2].status.as_str(), "PENDING");

    // A retry that succeeds still counts
    let (status, _) = app
        .webhook(completed_event(&split_id, &ids[1], "cs_test_1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert!(participants[1].is_paid());
}

#[tokio::test]
async fn test_webhook_signature_checks() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);
    let payload = serde_json::to_vec(&completed_event(&split_id, &ids[0], "cs_x")).unwrap();

    let response = app
        .client
        .post(format!("{}/webhooks/payment", app.base))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing signature");

    let forged = sign_payload("whsec_wrong", chrono::Utc::now().timestamp(), &payload).unwrap();
    let response = app
        .client
        .post(format!("{}/webhooks/payment", app.base))
        .header(SIGNATURE_HEADER, forged)
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid signature");

    // Nothing was written
    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert!(!participants[0].is_paid());
}

#[tokio::test]
async fn test_unknown_event_acknowledged() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .webhook(json!({ "type": "charge.refunded", "data": { "object": { "id": "ch_1" } } }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_pay_validation() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap();

    let (status, body) = app
        .post(&format!("/splits/{}/pay", split_id), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid participant ID");

    let (status, body) = app
        .post(
            "/splits/doesnotexist/pay",
            None,
            json!({ "participantId": "p1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Split not found");
}

#[tokio::test]
async fn test_capacity_reached_through_join() {
    let app = TestApp::spawn().await;
    let ana = app.token("user_ana", "Ana");

    let people: Vec<Value> = (0..50).map(|i| json!({ "name": format!("P{}", i) })).collect();
    let (status, created) = app
        .post(
            "/splits",
            Some(&ana),
            json!({ "billAmount": 100, "tipPercentage": 0, "participants": people }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = created["split"]["shareCode"].as_str().unwrap();
    let split_id = created["split"]["id"].as_str().unwrap();

    let (status, body) = app
        .post(&format!("/splits/{}", code), None, json!({ "name": "Number 51" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum participants reached");

    let participants = app.db.splits().participants(split_id).await.unwrap();
    assert_eq!(participants.len(), 50);
    assert!(participants.iter().all(|p| p.amount_cents == 200));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_keep_shares_exact() {
    let app = Arc::new(TestApp::spawn_on_file(Duration::from_secs(10), Duration::ZERO).await);
    let ana = app.token("user_ana", "Ana");

    let (status, created) = app
        .post(
            "/splits",
            Some(&ana),
            json!({
                "billAmount": 100,
                "tipPercentage": 0,
                "participants": [{ "name": "Ana" }, { "name": "Ben" }, { "name": "Cy" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = created["split"]["shareCode"].as_str().unwrap().to_string();
    let split_id = created["split"]["id"].as_str().unwrap().to_string();

    let joins: Vec<_> = (0..20)
        .map(|i| {
            let app = app.clone();
            let path = format!("/splits/{}", code);
            tokio::spawn(async move {
                app.post(&path, None, json!({ "name": format!("Guest {}", i) }))
                    .await
            })
        })
        .collect();
    for join in joins {
        let (status, body) = join.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    // 10000 cents over 23 people does not divide evenly
    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert_eq!(participants.len(), 23);
    let cents: Vec<i64> = participants.iter().map(|p| p.amount_cents).collect();
    assert_eq!(cents.iter().sum::<i64>(), 10_000);
    let (min, max) = (cents.iter().min().unwrap(), cents.iter().max().unwrap());
    assert_eq!((*min, *max), (434, 435));
    assert!(participants.iter().all(|p| !p.custom_amount));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_checkout_does_not_block_other_writes() {
    let app = Arc::new(
        TestApp::spawn_on_file(Duration::from_millis(500), Duration::from_secs(2)).await,
    );
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);

    let checkout = {
        let app = app.clone();
        let path = format!("/splits/{}/pay", split_id);
        let participant_id = ids[1].clone();
        tokio::spawn(async move {
            app.post(&path, None, json!({ "participantId": participant_id }))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Another creator's write while the checkout is still at the provider
    let bob = app.token("user_bob", "Bob");
    let started = Instant::now();
    let (status, body) = app
        .post(
            "/splits",
            Some(&bob),
            json!({ "billAmount": 40, "participants": [{ "name": "Bob" }, { "name": "Dan" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(started.elapsed() < Duration::from_secs(1));

    let (status, body) = checkout.await.unwrap();
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["checkoutUrl"], "https://checkout.test/cs_test_1");

    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert_eq!(participants[1].payment_session_id.as_deref(), Some("cs_test_1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_share_changed_during_checkout() {
    let app = Arc::new(
        TestApp::spawn_on_file(Duration::from_secs(5), Duration::from_secs(1)).await,
    );
    let ana = app.token("user_ana", "Ana");
    let created = app.create_dinner(&ana).await;
    let split_id = created["split"]["id"].as_str().unwrap().to_string();
    let code = created["split"]["shareCode"].as_str().unwrap().to_string();
    let ids = participant_ids(&created["split"]);

    let checkout = {
        let app = app.clone();
        let path = format!("/splits/{}/pay", split_id);
        let participant_id = ids[1].clone();
        tokio::spawn(async move {
            app.post(&path, None, json!({ "participantId": participant_id }))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Eve joins while Ben's $30.00 session is being created
    let (status, _) = app
        .post(&format!("/splits/{}", code), None, json!({ "name": "Eve" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = checkout.await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Share changed, please try again");

    let participants = app.db.splits().participants(&split_id).await.unwrap();
    assert!(participants[1].payment_session_id.is_none());

    // Retrying charges the new share
    let (status, _) = app
        .post(
            &format!("/splits/{}/pay", split_id),
            None,
            json!({ "participantId": ids[1] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let requests = app.payments.requests.lock().unwrap();
    assert_eq!(requests[0].amount.cents(), 3_000);
    assert_eq!(requests[1].amount.cents(), 2_400);
}
