//! Newsletter sends for admin callers.
//!
//! The caller check and subscriber lookup are collaborators behind
//! [`AdminGate`] and [`SubscriberDirectory`]; delivery goes through the
//! factory's provider as one bulk send.

use crate::error::EmailError;
use crate::factory::EmailServiceFactory;
use crate::models::{BulkEmailResult, BulkRecipient, SendBulkEmailParams};
use async_trait::async_trait;
use handlebars::html_escape;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Tag added to every newsletter message
pub const NEWSLETTER_TAG: &str = "newsletter";

/// Whatever the transport knows about the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Bearer token presented with the request, if any
    pub bearer_token: Option<String>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }
}

/// Decides whether a caller may send newsletters
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminGate: Send + Sync {
    async fn is_admin(&self, caller: &CallerContext) -> bool;
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Subscriber directory unavailable: {0}")]
    Unavailable(String),

    #[error("Subscriber directory is malformed: {0}")]
    Malformed(String),
}

/// Resolves subscriber addresses
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Confirmed subscribers having at least one of `tags`; every confirmed
    /// subscriber when `tags` is empty.
    async fn resolve(&self, tags: &[String]) -> Result<Vec<String>, DirectoryError>;
}

/// Who receives the newsletter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Sent as given
    Recipients(Vec<BulkRecipient>),
    /// Looked up in the subscriber directory
    Tags(Vec<String>),
}

impl Audience {
    /// Every confirmed subscriber
    pub fn everyone() -> Self {
        Audience::Tags(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsletterRequest {
    pub subject: String,
    /// Rendered HTML body
    pub html: String,
    /// Plain text appended to the body as escaped paragraphs
    pub extra_text: Option<String>,
    pub audience: Audience,
}

impl NewsletterRequest {
    pub fn new(subject: impl Into<String>, html: impl Into<String>, audience: Audience) -> Self {
        Self {
            subject: subject.into(),
            html: html.into(),
            extra_text: None,
            audience,
        }
    }

    pub fn with_extra_text(mut self, text: impl Into<String>) -> Self {
        self.extra_text = Some(text.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid newsletter: {0}")]
    Validation(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Sends one newsletter to an audience
#[derive(Clone)]
pub struct NewsletterDispatcher {
    factory: Arc<EmailServiceFactory>,
    gate: Arc<dyn AdminGate>,
    directory: Arc<dyn SubscriberDirectory>,
}

impl NewsletterDispatcher {
    pub fn new(
        factory: Arc<EmailServiceFactory>,
        gate: Arc<dyn AdminGate>,
        directory: Arc<dyn SubscriberDirectory>,
    ) -> Self {
        Self {
            factory,
            gate,
            directory,
        }
    }

    /// Authorize, resolve the audience and send.
    ///
    /// An empty audience succeeds with nothing sent and no provider call.
    /// Per-recipient failures are in the returned result.
    pub async fn send(
        &self,
        caller: &CallerContext,
        request: NewsletterRequest,
    ) -> Result<BulkEmailResult, NewsletterError> {
        if !self.gate.is_admin(caller).await {
            warn!("Rejected newsletter send from non-admin caller");
            return Err(NewsletterError::Unauthorized);
        }

        if request.subject.trim().is_empty() {
            return Err(NewsletterError::Validation("subject is required".into()));
        }
        if request.html.trim().is_empty() {
            return Err(NewsletterError::Validation("html body is required".into()));
        }

        let (recipients, filter_tags) = match request.audience {
            Audience::Recipients(recipients) => (recipients, Vec::new()),
            Audience::Tags(tags) => {
                let addresses = self.directory.resolve(&tags).await?;
                let recipients: Vec<BulkRecipient> =
                    addresses.into_iter().map(BulkRecipient::new).collect();
                (recipients, tags)
            }
        };

        if recipients.is_empty() {
            info!(tags = ?filter_tags, "Newsletter has no recipients");
            return Ok(BulkEmailResult::empty());
        }

        let mut tags = vec![NEWSLETTER_TAG.to_string()];
        tags.extend(filter_tags.into_iter().filter(|t| t != NEWSLETTER_TAG));

        let params = SendBulkEmailParams::new(
            recipients,
            request.subject,
            compose_html(&request.html, request.extra_text.as_deref()),
        )
        .with_tags(tags);

        let provider = self.factory.get()?;

        info!(
            provider = provider.name(),
            recipients = params.recipients.len(),
            subject = %params.subject,
            "Sending newsletter"
        );

        let result = provider.send_bulk_email(&params).await?;

        info!(
            total_sent = result.total_sent,
            failed = result.failed.len(),
            "Newsletter sent"
        );

        Ok(result)
    }
}

/// `html` followed by `extra_text` as escaped paragraphs. Blank lines split
/// paragraphs; single newlines become `<br>`.
pub fn compose_html(html: &str, extra_text: Option<&str>) -> String {
    let paragraphs: Vec<String> = extra_text
        .unwrap_or_default()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", html_escape(p).replace('\n', "<br>")))
        .collect();

    if paragraphs.is_empty() {
        return html.to_string();
    }

    format!("{}\n{}", html, paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DynEmailProvider, MockEmailProvider};

    fn allow_all() -> MockAdminGate {
        let mut gate = MockAdminGate::new();
        gate.expect_is_admin().returning(|_| true);
        gate
    }

    fn dispatcher(
        provider: Arc<MockEmailProvider>,
        gate: MockAdminGate,
        directory: MockSubscriberDirectory,
    ) -> NewsletterDispatcher {
        let provider: DynEmailProvider = provider;
        NewsletterDispatcher::new(
            Arc::new(EmailServiceFactory::with_provider(provider)),
            Arc::new(gate),
            Arc::new(directory),
        )
    }

    #[tokio::test]
    async fn test_non_admin_is_rejected_before_lookup() {
        let mut gate = MockAdminGate::new();
        gate.expect_is_admin().times(1).returning(|_| false);
        let mut directory = MockSubscriberDirectory::new();
        directory.expect_resolve().never();
        let provider = Arc::new(MockEmailProvider::new());

        let err = dispatcher(provider.clone(), gate, directory)
            .send(
                &CallerContext::anonymous(),
                NewsletterRequest::new("Hi", "<p>Hi</p>", Audience::everyone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NewsletterError::Unauthorized));
        assert_eq!(provider.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_tag_audience_is_resolved_and_tagged() {
        let mut directory = MockSubscriberDirectory::new();
        directory
            .expect_resolve()
            .withf(|tags| tags.len() == 1 && tags[0] == "rust")
            .times(1)
            .returning(|_| Ok(vec!["a@x.com".into(), "b@x.com".into()]));
        let provider = Arc::new(MockEmailProvider::new());

        let result = dispatcher(provider.clone(), allow_all(), directory)
            .send(
                &CallerContext::with_bearer("token"),
                NewsletterRequest::new(
                    "New posts",
                    "<h1>Posts</h1>",
                    Audience::Tags(vec!["rust".into()]),
                )
                .with_extra_text("Thanks for reading & sharing"),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.total_sent, 2);

        let sent = provider.sent_emails().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].tags, vec!["newsletter", "rust"]);
        assert!(sent[0].html.ends_with("<p>Thanks for reading &amp; sharing</p>"));
        assert_eq!(sent[0].text, None);
    }

    #[tokio::test]
    async fn test_explicit_recipients_skip_directory() {
        let mut directory = MockSubscriberDirectory::new();
        directory.expect_resolve().never();
        let provider = Arc::new(MockEmailProvider::new().failing_for(["b@x.com"]));

        let result = dispatcher(provider, allow_all(), directory)
            .send(
                &CallerContext::with_bearer("token"),
                NewsletterRequest::new(
                    "Hello",
                    "<p>Hello</p>",
                    Audience::Recipients(vec![
                        "a@x.com".into(),
                        "b@x.com".into(),
                        "c@x.com".into(),
                    ]),
                ),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.total_sent, 2);
        assert_eq!(result.failed[0].email, "b@x.com");
    }

    #[tokio::test]
    async fn test_empty_audience_sends_nothing() {
        let mut directory = MockSubscriberDirectory::new();
        directory.expect_resolve().returning(|_| Ok(Vec::new()));
        let provider = Arc::new(MockEmailProvider::new());

        let result = dispatcher(provider.clone(), allow_all(), directory)
            .send(
                &CallerContext::with_bearer("token"),
                NewsletterRequest::new("Hello", "<p>Hello</p>", Audience::everyone()),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.total_sent, 0);
        assert_eq!(provider.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_blank_subject_is_rejected() {
        let mut directory = MockSubscriberDirectory::new();
        directory.expect_resolve().never();

        let err = dispatcher(Arc::new(MockEmailProvider::new()), allow_all(), directory)
            .send(
                &CallerContext::with_bearer("token"),
                NewsletterRequest::new(" ", "<p>Hello</p>", Audience::everyone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NewsletterError::Validation(_)));
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let mut directory = MockSubscriberDirectory::new();
        directory
            .expect_resolve()
            .returning(|_| Err(DirectoryError::Unavailable("file missing".into())));

        let err = dispatcher(Arc::new(MockEmailProvider::new()), allow_all(), directory)
            .send(
                &CallerContext::with_bearer("token"),
                NewsletterRequest::new("Hello", "<p>Hello</p>", Audience::everyone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NewsletterError::Directory(_)));
    }

    #[test]
    fn test_compose_html() {
        assert_eq!(compose_html("<p>a</p>", None), "<p>a</p>");
        assert_eq!(compose_html("<p>a</p>", Some("   ")), "<p>a</p>");
        assert_eq!(
            compose_html("<p>a</p>", Some("one\ntwo\n\n<three>")),
            "<p>a</p>\n<p>one<br>two</p>\n<p>&lt;three&gt;</p>"
        );
    }

    #[test]
    fn test_extra_text_markup_is_escaped() {
        assert_eq!(
            compose_html("<p>a</p>", Some("Tom & Jerry <b>")),
            "<p>a</p>\n<p>Tom &amp; Jerry &lt;b&gt;</p>"
        );
    }
}
