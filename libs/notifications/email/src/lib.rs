//! Outbound email dispatch
//!
//! Sends single and bulk transactional email through one of several
//! interchangeable providers, retrying transient failures and reporting
//! per-recipient outcomes for bulk sends.
//!
//! ## Components
//!
//! - **Providers**: SendGrid, Brevo and AWS SES behind [`EmailProvider`], plus a
//!   recording [`MockEmailProvider`] for tests
//! - **Bulk fan-out**: [`BulkDispatcher`] for providers without a native bulk endpoint
//! - **Factory**: [`EmailServiceFactory`] builds the configured provider once
//! - **Newsletter**: [`NewsletterDispatcher`], the admin-facing entry point
//!
//! ## Usage
//!
//! ```ignore
//! use email::{EmailServiceFactory, SendEmailParams};
//!
//! let factory = EmailServiceFactory::from_process_env();
//! let provider = factory.get()?;
//! let result = provider
//!     .send_email(&SendEmailParams::new("a@example.com", "Hello", "<p>Hi</p>"))
//!     .await?;
//! ```

pub mod bulk;
pub mod config;
pub mod error;
pub mod factory;
pub mod models;
pub mod newsletter;
pub mod provider;

pub use bulk::BulkDispatcher;
pub use config::{EmailConfig, ProviderConfig, ProviderKind};
pub use error::{DispatchResult, EmailError};
pub use factory::EmailServiceFactory;
pub use models::{
    BulkEmailResult, BulkRecipient, EmailResult, FailedRecipient, SendBulkEmailParams,
    SendEmailParams,
};
pub use newsletter::{
    AdminGate, Audience, CallerContext, DirectoryError, NewsletterDispatcher, NewsletterError,
    NewsletterRequest, SubscriberDirectory,
};
pub use provider::{
    create_provider, BrevoProvider, DynEmailProvider, EmailProvider, MockEmailProvider,
    SendGridProvider, SesProvider,
};
