use crate::{RetryPolicy, Retryable};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, error, warn};

/// Labels attached to every log line emitted while retrying.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    pub component: &'static str,
    pub action: &'static str,
    /// What the operation is aimed at, e.g. a recipient address
    pub target: Option<String>,
}

impl RetryContext {
    pub fn new(component: &'static str, action: &'static str) -> Self {
        Self {
            component,
            action,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn target(&self) -> &str {
        self.target.as_deref().unwrap_or("-")
    }
}

/// Run `operation` until it succeeds, fails with a category the policy does
/// not retry, or `policy.max_attempts` attempts have been made.
///
/// Attempts are strictly sequential. The last error is returned on exhaustion.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    context: &RetryContext,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!(
            component = context.component,
            action = context.action,
            target_addr = context.target(),
            attempt,
            max_attempts,
            "Attempting operation"
        );

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let category = err.category();

        if !policy.should_retry(category) {
            error!(
                component = context.component,
                action = context.action,
                target_addr = context.target(),
                attempt,
                ?category,
                error = %err,
                "Operation failed with non-retryable error"
            );
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(
                component = context.component,
                action = context.action,
                target_addr = context.target(),
                attempts = attempt,
                ?category,
                error = %err,
                "Operation failed after exhausting retries"
            );
            return Err(err);
        }

        let delay = policy.backoff.delay(attempt - 1);
        warn!(
            component = context.component,
            action = context.action,
            target_addr = context.target(),
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, retrying"
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
