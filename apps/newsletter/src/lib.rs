//! Newsletter API
//!
//! HTTP front for the email dispatch engine.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `POST /api/admin/newsletter/send`: admin-only, bearer token from `ADMIN_API_TOKEN`
//!
//! The email provider is resolved from the environment on the first send, so a
//! misconfigured provider surfaces as a `500` on that request instead of
//! blocking startup.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod subscribers;

use auth::BearerTokenGate;
use config::AppConfig;
use core_config::{Environment, FromEnv};
use email::{EmailServiceFactory, NewsletterDispatcher};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use subscribers::JsonFileDirectory;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

/// Run the newsletter API
///
/// # Errors
///
/// Returns an error if:
/// - `ADMIN_API_TOKEN` or the server settings are invalid
/// - The listener cannot bind
/// - The server fails while running
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let config = AppConfig::from_env().wrap_err("Failed to load newsletter API configuration")?;

    info!(
        environment = ?environment,
        subscribers_file = %config.subscribers_file.display(),
        "Starting newsletter API"
    );

    let dispatcher = NewsletterDispatcher::new(
        Arc::new(EmailServiceFactory::from_process_env()),
        Arc::new(BearerTokenGate::new(config.admin_token.clone())),
        Arc::new(JsonFileDirectory::new(config.subscribers_file.clone())),
    );

    let app = handlers::router(dispatcher);

    let addr = config.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind newsletter API to {}", addr))?;

    info!(address = %addr, "Newsletter API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Newsletter API server failed")?;

    info!("Newsletter API stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
