//! Error categorization
//!
//! - **Transient**: network failures, timeouts, 5xx. Usually worth retrying.
//! - **RateLimited**: the remote asked us to slow down (429).
//! - **Permanent**: caller or credential mistakes (4xx). Retrying cannot help.

/// Category of a failure, used by [`crate::RetryPolicy`] to decide on retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Transient,
    RateLimited,
    Permanent,
}

impl ErrorCategory {
    /// Classify an HTTP status code. `None` means no response was received.
    pub fn from_http_status(status: Option<u16>) -> Self {
        match status {
            None => ErrorCategory::Transient,
            Some(429) => ErrorCategory::RateLimited,
            Some(408) => ErrorCategory::Transient,
            Some(s) if s >= 500 => ErrorCategory::Transient,
            Some(_) => ErrorCategory::Permanent,
        }
    }
}

/// Implemented by error types that can be run through [`crate::with_retry`]
pub trait Retryable {
    fn category(&self) -> ErrorCategory;
}
