use crate::ErrorCategory;
use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Same pause before every retry
    Fixed(Duration),
    /// `initial * multiplier^retry`, capped at `max`
    Exponential {
        initial: Duration,
        multiplier: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Pause before retry number `retry` (0 = the pause before the second attempt).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => initial
                .saturating_mul(multiplier.saturating_pow(retry))
                .min(*max),
        }
    }
}

/// How many attempts to make, how long to wait between them, and which
/// failure categories are worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never less than 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retry_on: Vec<ErrorCategory>,
}

impl Default for RetryPolicy {
    /// 3 attempts, 1s doubling up to 10s, retrying transient and rate-limited failures
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                multiplier: 2,
                max: Duration::from_secs(10),
            },
            retry_on: vec![ErrorCategory::Transient, ErrorCategory::RateLimited],
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the set of categories that get retried
    pub fn retry_on(mut self, categories: impl IntoIterator<Item = ErrorCategory>) -> Self {
        self.retry_on = categories.into_iter().collect();
        self
    }

    pub fn should_retry(&self, category: ErrorCategory) -> bool {
        self.retry_on.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(1000),
            multiplier: 2,
            max: Duration::from_millis(30_000),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(1000));
        assert_eq!(backoff.delay(1), Duration::from_millis(2000));
        assert_eq!(backoff.delay(2), Duration::from_millis(4000));
        assert_eq!(backoff.delay(5), Duration::from_millis(30_000));
        assert_eq!(backoff.delay(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_fixed_and_none_backoff() {
        assert_eq!(Backoff::Fixed(Duration::from_millis(250)).delay(7), Duration::from_millis(250));
        assert_eq!(Backoff::None.delay(3), Duration::ZERO);
    }

    #[test]
    fn test_default_policy_retries_transient_and_rate_limited_only() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.should_retry(ErrorCategory::Transient));
        assert!(policy.should_retry(ErrorCategory::RateLimited));
        assert!(!policy.should_retry(ErrorCategory::Permanent));
    }

    #[test]
    fn test_max_attempts_never_zero() {
        assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }

    #[test]
    fn test_retry_on_replaces_categories() {
        let policy = RetryPolicy::new().retry_on([ErrorCategory::Transient]);
        assert!(!policy.should_retry(ErrorCategory::RateLimited));
    }
}
