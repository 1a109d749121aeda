//! API server configuration.
//!
//! ## Load Order
//! ```text
//! built-in defaults  ──►  splitpay.toml (optional)  ──►  SPLITPAY_* env vars
//!                                                          (highest priority)
//! ```
//!
//! `SPLITPAY_DATABASE_URL=/data/splitpay.db` overrides `database_url`, and so
//! on for every key of [`AppConfig`].

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// SQLite file path or `sqlite:` URL
    pub database_url: String,

    /// Public base URL of the web client, used in share links and checkout
    /// redirects
    pub app_base_url: String,

    /// Secret API key of the payment provider. Checkout is unavailable
    /// without it.
    pub payment_secret_key: Option<String>,

    /// Signing secret for payment webhooks
    pub payment_webhook_secret: Option<String>,

    /// Payment provider API base
    pub payment_api_base: String,

    /// Messaging provider account id. SMS falls back to a logging mock when
    /// any messaging credential is missing.
    pub messaging_account_sid: Option<String>,

    pub messaging_auth_token: Option<String>,

    /// Sender number for invites
    pub messaging_from_number: Option<String>,

    /// Messaging provider API base
    pub messaging_api_base: String,

    /// HS256 secret shared with the identity provider
    pub auth_jwt_secret: String,
}

impl AppConfig {
    /// Loads configuration from defaults, `splitpay.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("SPLITPAY"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("port", 3000)?
            .set_default("database_url", "splitpay.db")?
            .set_default("app_base_url", "https://caption-brunch.vercel.app")?
            .set_default("payment_api_base", "https://api.stripe.com")?
            .set_default("messaging_api_base", "https://api.twilio.com")?
            .add_source(File::with_name("splitpay").required(false))
            .add_source(env)
            .build()?;

        let app: AppConfig = config.try_deserialize()?;

        if app.auth_jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth_jwt_secret".to_string()));
        }

        Ok(app)
    }

    /// `app_base_url` without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.app_base_url.trim_end_matches('/')
    }

    /// True when every messaging credential is present.
    pub fn messaging_configured(&self) -> bool {
        self.messaging_account_sid.is_some()
            && self.messaging_auth_token.is_some()
            && self.messaging_from_number.is_some()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
