//! AWS SES (Simple Email Service) provider
//!
//! Sends emails via the AWS SES v2 API using a static access key pair.
//!
//! The SDK's own retry layer is disabled; retries come from the provider's
//! [`RetryPolicy`] like every other provider. Bulk sends fan out through
//! [`BulkDispatcher`].

use crate::bulk::BulkDispatcher;
use crate::error::{DispatchResult, EmailError};
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use crate::provider::EmailProvider;
use async_trait::async_trait;
use aws_sdk_sesv2::config::http::HttpResponse;
use aws_sdk_sesv2::config::retry::RetryConfig;
use aws_sdk_sesv2::config::timeout::TimeoutConfig;
use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sesv2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sesv2::operation::send_email::SendEmailError;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message, MessageTag};
use aws_sdk_sesv2::Client;
use retry::{with_retry, RetryContext, RetryPolicy};
use std::time::Duration;
use tracing::{debug, error};

const PROVIDER: &str = "ses";

/// Tag name used for every message tag
const TAG_NAME: &str = "Category";

/// AWS SES email provider
pub struct SesProvider {
    client: Client,
    from_email: String,
    retry: RetryPolicy,
    bulk: BulkDispatcher,
}

impl SesProvider {
    /// Create a new SesProvider with an existing AWS SES client
    pub fn new(client: Client, from_email: impl Into<String>) -> Self {
        Self {
            client,
            from_email: from_email.into(),
            retry: RetryPolicy::default(),
            bulk: BulkDispatcher::default(),
        }
    }

    /// Create with explicit credentials.
    ///
    /// `endpoint_url` overrides the regional endpoint (local stacks, tests).
    /// Credentials are not checked until the first send.
    pub fn with_credentials(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<&str>,
        timeout: Duration,
        from_email: impl Into<String>,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None, // session token
            None, // expiry
            "static",
        );

        let mut config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());

        if let Some(url) = endpoint_url {
            config = config.endpoint_url(url);
        }

        Self::new(Client::from_conf(config.build()), from_email)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_bulk(mut self, bulk: BulkDispatcher) -> Self {
        self.bulk = bulk;
        self
    }

    /// One SendEmail call; returns the message id
    async fn submit(&self, params: &SendEmailParams) -> DispatchResult<Option<String>> {
        let mut body = Body::builder().html(content(&params.html)?);
        if let Some(text) = &params.text {
            body = body.text(content(text)?);
        }

        let message = Message::builder()
            .subject(content(&params.subject)?)
            .body(body.build())
            .build();

        let mut request = self
            .client
            .send_email()
            .from_email_address(params.from.as_deref().unwrap_or(&self.from_email))
            .destination(
                Destination::builder()
                    .to_addresses(format_address(&params.to, params.to_name.as_deref()))
                    .build(),
            )
            .content(EmailContent::builder().simple(message).build());

        if let Some(reply_to) = &params.reply_to {
            request = request.reply_to_addresses(reply_to);
        }

        for tag in params.tags.iter().filter_map(|t| sanitize_tag(t)) {
            let tag = MessageTag::builder()
                .name(TAG_NAME)
                .value(tag)
                .build()
                .map_err(|e| EmailError::Validation(e.to_string()))?;
            request = request.email_tags(tag);
        }

        let response = request.send().await.map_err(|e| {
            let err = map_send_error(e);
            error!(error = %err, "AWS SES send failed");
            err
        })?;

        Ok(response.message_id().map(str::to_string))
    }
}

#[async_trait]
impl EmailProvider for SesProvider {
    async fn send_email(&self, params: &SendEmailParams) -> DispatchResult<EmailResult> {
        params.validate()?;

        debug!(
            to = %params.to,
            subject = %params.subject,
            "Sending email via AWS SES"
        );

        let context = RetryContext::new("SesProvider", "send_email").with_target(&params.to);
        let message_id = with_retry(|| self.submit(params), &self.retry, &context).await?;

        debug!(to = %params.to, message_id = ?message_id, "Email sent via AWS SES");

        Ok(EmailResult::sent(message_id, Some(200)))
    }

    async fn send_bulk_email(
        &self,
        params: &SendBulkEmailParams,
    ) -> DispatchResult<BulkEmailResult> {
        self.bulk
            .dispatch(params, |single| async move { self.send_email(&single).await })
            .await
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

fn content(data: &str) -> DispatchResult<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| EmailError::Validation(e.to_string()))
}

/// Format email address with name
fn format_address(email: &str, name: Option<&str>) -> String {
    match name {
        Some(n) if !n.is_empty() => format!("{} <{}>", n, email),
        _ => email.to_string(),
    }
}

/// SES tag values only allow ASCII letters, digits, `_` and `-`
fn sanitize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return None;
    }

    Some(
        tag.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
    )
}

fn map_send_error(err: SdkError<SendEmailError, HttpResponse>) -> EmailError {
    match &err {
        SdkError::ServiceError(service) => {
            let raw = service.raw();
            EmailError::Api {
                provider: PROVIDER,
                status: raw.status().as_u16(),
                message: service
                    .err()
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
                body: raw
                    .body()
                    .bytes()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default(),
            }
        }
        SdkError::ResponseError(response) => EmailError::Api {
            provider: PROVIDER,
            status: response.raw().status().as_u16(),
            message: DisplayErrorContext(&err).to_string(),
            body: String::new(),
        },
        SdkError::ConstructionFailure(_) => {
            EmailError::Validation(DisplayErrorContext(&err).to_string())
        }
        // dispatch failures and timeouts never reached a response
        _ => EmailError::Network {
            provider: PROVIDER,
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address("test@example.com", Some("Test User")),
            "Test User <test@example.com>"
        );
        assert_eq!(format_address("test@example.com", None), "test@example.com");
        assert_eq!(format_address("test@example.com", Some("")), "test@example.com");
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("newsletter").as_deref(), Some("newsletter"));
        assert_eq!(sanitize_tag("rust lang!").as_deref(), Some("rust_lang_"));
        assert_eq!(sanitize_tag("web-dev_2").as_deref(), Some("web-dev_2"));
        assert_eq!(sanitize_tag("  "), None);
    }
}
