//! # SplitPay API
//!
//! HTTP server for splitting a restaurant bill and collecting each share
//! through a hosted card checkout.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SplitPay API                                   │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  routes (axum)                                                    │  │
//! │  │   GET/POST /splits        GET/POST /splits/{id}                   │  │
//! │  │   POST /splits/{id}/pay   POST /sms/invite                        │  │
//! │  │   POST /webhooks/payment  GET /health                             │  │
//! │  └───────────────────────────────┬──────────────────────────────────┘  │
//! │          auth extractors ────────┤ JSON parsing + validation            │
//! │                                  ▼                                      │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  SplitService                                                     │  │
//! │  │   rules: splitpay-core        persistence: splitpay-db (SQLite)   │  │
//! │  └───────────────────────────────┬──────────────────────────────────┘  │
//! │                                  ▼                                      │
//! │  ┌──────────────────┐ ┌───────────────────┐ ┌───────────────────┐      │
//! │  │ IdentityProvider │ │  PaymentProvider  │ │ MessagingProvider │      │
//! │  │  JWT (HS256)     │ │  hosted checkout  │ │  SMS              │      │
//! │  └──────────────────┘ └───────────────────┘ └───────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::AppConfig`]. Every key can be set through a `SPLITPAY_`
//! environment variable, e.g. `SPLITPAY_AUTH_JWT_SECRET`.

pub mod auth;
pub mod config;
pub mod error;
pub mod providers;
pub mod routes;
pub mod services;
pub mod views;

use std::sync::Arc;

// Re-exports
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;

use providers::{IdentityProvider, MessagingProvider, PaymentProvider};
use services::split_service::SplitService;
use splitpay_db::Database;

/// Shared application state.
///
/// Cheap to clone: the database is a pool handle and everything else is
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentProvider>,
    pub messaging: Arc<dyn MessagingProvider>,
}

impl AppState {
    /// The split service over this state.
    pub fn splits(&self) -> SplitService {
        SplitService::new(self.clone())
    }
}
