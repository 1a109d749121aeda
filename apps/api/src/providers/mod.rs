//! # External Providers
//!
//! Capability traits for everything SplitPay does not own: who the caller
//! is, taking card payments, and sending text messages.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Provider Seams                                   │
//! │                                                                         │
//! │  SplitService                                                           │
//! │      │                                                                  │
//! │      ├── Arc<dyn IdentityProvider>  ── JwtIdentityProvider (HS256)     │
//! │      ├── Arc<dyn PaymentProvider>   ── CheckoutPaymentProvider (HTTP)  │
//! │      └── Arc<dyn MessagingProvider> ── SmsMessagingProvider (HTTP)     │
//! │                                        LoggingMessagingProvider (mock) │
//! │                                                                         │
//! │  Tests swap any of them for in-process fakes.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod messaging;
pub mod payment;

use async_trait::async_trait;
use splitpay_core::Money;

pub use messaging::{messaging_from_config, LoggingMessagingProvider, SmsMessagingProvider};
pub use payment::CheckoutPaymentProvider;

// =============================================================================
// Identity
// =============================================================================

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject id issued by the identity provider.
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Turns a bearer token into an [`Identity`].
pub trait IdentityProvider: Send + Sync {
    /// Verifies the token and returns who it belongs to.
    ///
    /// ## Errors
    /// [`ProviderError::InvalidToken`] for malformed, expired or forged tokens.
    fn verify(&self, token: &str) -> ProviderResult<Identity>;
}

// =============================================================================
// Payments
// =============================================================================

/// One hosted checkout for one participant's share.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub split_id: String,
    pub participant_id: String,
    pub amount: Money,
    /// Line item label shown on the hosted page.
    pub product_name: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    /// Where to send the payer.
    pub url: String,
}

/// A verified webhook event, reduced to what settlement needs.
///
/// The split and participant ids come from the metadata set at checkout;
/// they are `None` when the provider dropped them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// The payer finished checkout and the charge succeeded.
    CheckoutCompleted {
        session_id: String,
        payment_intent_id: Option<String>,
        split_id: Option<String>,
        participant_id: Option<String>,
    },
    /// A charge attempt was declined.
    PaymentFailed {
        payment_intent_id: String,
        split_id: Option<String>,
        participant_id: Option<String>,
    },
    /// Anything else; acknowledged and ignored.
    Other { kind: String },
}

/// Hosted checkout plus signed webhooks.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a hosted checkout session for the exact amount.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ProviderResult<CheckoutSession>;

    /// Verifies a webhook signature and decodes the event.
    ///
    /// `signature` is the raw signature header, `None` when absent.
    fn verify_event(&self, payload: &[u8], signature: Option<&str>)
        -> ProviderResult<PaymentEvent>;
}

// =============================================================================
// Messaging
// =============================================================================

/// Outbound SMS.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Sends one message and returns the provider's message id.
    async fn send_sms(&self, to: &str, body: &str) -> ProviderResult<String>;
}

// =============================================================================
// Errors
// =============================================================================

/// Provider failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// A credential the call needs is not configured.
    #[error("Provider not configured: {0} is missing")]
    NotConfigured(&'static str),

    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
