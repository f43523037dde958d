//! Email provider implementations

pub mod brevo;
pub mod mock;
pub mod sendgrid;
pub mod ses;

pub use brevo::BrevoProvider;
pub use mock::MockEmailProvider;
pub use sendgrid::SendGridProvider;
pub use ses::SesProvider;

use crate::bulk::BulkDispatcher;
use crate::config::{EmailConfig, ProviderConfig};
use crate::error::{DispatchResult, EmailError};
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Trait for email providers
///
/// Implementations hold credentials and a default sender, and no per-request
/// state, so one instance is shared by every caller in the process.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one message, retrying per the provider's policy.
    ///
    /// Failures that outlive the retry policy are returned as errors.
    async fn send_email(&self, params: &SendEmailParams) -> DispatchResult<EmailResult>;

    /// Send the same message to every recipient.
    ///
    /// Per-recipient failures are reported in the result; an error means
    /// nothing was attempted.
    async fn send_bulk_email(&self, params: &SendBulkEmailParams)
        -> DispatchResult<BulkEmailResult>;

    /// Get provider name
    fn name(&self) -> &'static str;
}

impl fmt::Debug for dyn EmailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Shared provider handle
pub type DynEmailProvider = Arc<dyn EmailProvider>;

/// Build the provider selected by `config`.
///
/// No network call is made here; credentials are first exercised by a send.
pub fn create_provider(config: &EmailConfig) -> DispatchResult<DynEmailProvider> {
    let provider: DynEmailProvider = match &config.provider {
        ProviderConfig::SendGrid { api_key, base_url } => Arc::new(
            SendGridProvider::new(api_key, &config.from_email)
                .with_base_url(base_url)
                .with_client(http_client(config.http_timeout)?)
                .with_retry(config.retry.clone()),
        ),
        ProviderConfig::Brevo { api_key, base_url } => Arc::new(
            BrevoProvider::new(api_key, &config.from_email)
                .with_base_url(base_url)
                .with_client(http_client(config.http_timeout)?)
                .with_retry(config.retry.clone())
                .with_bulk(BulkDispatcher::new(config.bulk_concurrency)),
        ),
        ProviderConfig::Ses {
            region,
            access_key_id,
            secret_access_key,
            endpoint_url,
        } => Arc::new(
            SesProvider::with_credentials(
                access_key_id,
                secret_access_key,
                region,
                endpoint_url.as_deref(),
                config.http_timeout,
                &config.from_email,
            )
            .with_retry(config.retry.clone())
            .with_bulk(BulkDispatcher::new(config.bulk_concurrency)),
        ),
    };

    info!(
        provider = provider.name(),
        from = %config.from_email,
        "Email provider initialized"
    );

    Ok(provider)
}

/// HTTP client shared by one provider instance
pub fn http_client(timeout: Duration) -> DispatchResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EmailError::Client(e.to_string()))
}

/// `errors[0].message`, then `message`, then `fallback`
pub(crate) fn api_error_message(body: &str, fallback: &str) -> String {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) => return fallback.to_string(),
    };

    json.pointer("/errors/0/message")
        .or_else(|| json.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
