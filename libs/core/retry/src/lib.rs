//! Generic retry-with-backoff for outbound calls.
//!
//! The executor knows nothing about what it retries. Errors classify
//! themselves through [`Retryable`], the [`RetryPolicy`] decides which
//! categories are worth another attempt and how long to wait, and
//! [`with_retry`] runs the attempts one after another.
//!
//! ```text
//! attempt 1 ──fail(transient)──> sleep(backoff(0)) ──> attempt 2 ──fail──> ... ──> last error
//!     │                                                    │
//!     └──ok──> value                                       └──fail(permanent)──> error (no more attempts)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use retry::{with_retry, RetryContext, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let ctx = RetryContext::new("SendGridProvider", "send_email").with_target("a@example.com");
//! let id = with_retry(|| client.send(&request), &policy, &ctx).await?;
//! ```

mod category;
mod executor;
mod policy;

pub use category::{ErrorCategory, Retryable};
pub use executor::{with_retry, RetryContext};
pub use policy::{Backoff, RetryPolicy};
