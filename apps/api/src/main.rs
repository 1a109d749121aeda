//! # SplitPay API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SplitPay API Server                              │
//! │                                                                         │
//! │  1. tracing (RUST_LOG or "info,splitpay=debug,sqlx=warn")              │
//! │  2. AppConfig::load()  defaults → splitpay.toml → SPLITPAY_* env       │
//! │  3. SQLite pool + migrations                                           │
//! │  4. providers: JWT identity, checkout, SMS (or logging stand-in)       │
//! │  5. axum on 0.0.0.0:{port} until Ctrl+C / SIGTERM                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use splitpay_api::auth::JwtIdentityProvider;
use splitpay_api::providers::{messaging_from_config, CheckoutPaymentProvider};
use splitpay_api::{router, AppConfig, AppState};
use splitpay_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting SplitPay API server...");

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;
    info!(
        port = config.port,
        database = %config.database_url,
        payments_configured = config.payment_secret_key.is_some(),
        messaging_configured = config.messaging_configured(),
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(DbConfig::new(&config.database_url))
        .await
        .context("failed to open database")?;

    // Providers
    let payments = CheckoutPaymentProvider::new(
        &config.payment_api_base,
        config.payment_secret_key.clone(),
        config.payment_webhook_secret.clone(),
    )
    .context("failed to build payment client")?;
    let messaging = messaging_from_config(&config).context("failed to build messaging client")?;
    let identity = JwtIdentityProvider::new(config.auth_jwt_secret.clone());

    let port = config.port;
    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        identity: Arc::new(identity),
        payments: Arc::new(payments),
        messaging,
    };

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    info!(addr = %bind_addr, "HTTP server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Initializes tracing.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,splitpay=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Graceful shutdown signal handler.
///
/// A handler that fails to install is logged and never fires; the other
/// one still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
