//! Error types for email dispatch.
//!
//! Categories drive retries:
//! - `Config`, `Client` and `Validation` are caller/deployment mistakes and never retried
//! - `Network` (no response) is transient
//! - `Api` is classified by status: 408/5xx transient, 429 rate limited, other 4xx permanent

use core_config::ConfigError;
use retry::{ErrorCategory, Retryable};
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, EmailError>;

#[derive(Debug, Error)]
pub enum EmailError {
    /// Missing or invalid provider configuration
    #[error("Email configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Params rejected before any network call
    #[error("Invalid email: {0}")]
    Validation(String),

    /// The request never produced a response (connect, TLS, timeout)
    #[error("{provider} request failed: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    /// The provider answered with a non-success status
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
        /// Raw response body, kept for debugging
        body: String,
    },
}

impl EmailError {
    /// HTTP status returned by the provider, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EmailError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, EmailError::Config(_))
    }
}

impl Retryable for EmailError {
    fn category(&self) -> ErrorCategory {
        match self {
            EmailError::Config(_) | EmailError::Client(_) | EmailError::Validation(_) => {
                ErrorCategory::Permanent
            }
            EmailError::Network { .. } => ErrorCategory::Transient,
            EmailError::Api { status, .. } => ErrorCategory::from_http_status(Some(*status)),
        }
    }
}
