//! SendGrid email provider
//!
//! Sends emails via the SendGrid v3 HTTP API. The message id comes back in
//! the `X-Message-Id` response header. Bulk sends use the native
//! personalizations array, so each request is all-or-nothing and a blank
//! address fails the whole call before any request is sent.

use crate::config::SENDGRID_DEFAULT_URL;
use crate::error::{DispatchResult, EmailError};
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use crate::provider::{api_error_message, EmailProvider};
use async_trait::async_trait;
use reqwest::Client;
use retry::{with_retry, RetryContext, RetryPolicy};
use serde::Serialize;
use tracing::{debug, error, info, warn};

const PROVIDER: &str = "sendgrid";

/// SendGrid rejects requests with more personalizations than this
pub const MAX_PERSONALIZATIONS: usize = 1000;

/// SendGrid email provider
pub struct SendGridProvider {
    api_key: String,
    from_email: String,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl SendGridProvider {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_email: from_email.into(),
            base_url: SENDGRID_DEFAULT_URL.to_string(),
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point at another API host (tests, regional endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v3/mail/send", self.base_url.trim_end_matches('/'))
    }

    /// One POST; returns the status and message id on 2xx
    async fn post(&self, request: &SendGridRequest<'_>) -> DispatchResult<(u16, Option<String>)> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| EmailError::Network {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok((status.as_u16(), message_id));
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), error = %body, "SendGrid API error");

        Err(EmailError::Api {
            provider: PROVIDER,
            status: status.as_u16(),
            message: api_error_message(&body, "Failed to send email via SendGrid"),
            body,
        })
    }

    fn request<'a>(
        &'a self,
        personalizations: Vec<Personalization<'a>>,
        message: Message<'a>,
    ) -> SendGridRequest<'a> {
        // text/plain must precede text/html
        let mut content = Vec::with_capacity(2);
        if let Some(text) = message.text {
            content.push(Content {
                content_type: "text/plain",
                value: text,
            });
        }
        content.push(Content {
            content_type: "text/html",
            value: message.html,
        });

        SendGridRequest {
            personalizations,
            from: EmailAddress {
                email: message.from.unwrap_or(&self.from_email),
                name: None,
            },
            reply_to: message.reply_to.map(|email| EmailAddress { email, name: None }),
            subject: message.subject,
            content,
            categories: Some(message.tags).filter(|tags| !tags.is_empty()),
        }
    }
}

/// Fields shared by every personalization of a request
struct Message<'a> {
    subject: &'a str,
    html: &'a str,
    text: Option<&'a str>,
    from: Option<&'a str>,
    reply_to: Option<&'a str>,
    tags: &'a [String],
}

impl<'a> From<&'a SendEmailParams> for Message<'a> {
    fn from(params: &'a SendEmailParams) -> Self {
        Self {
            subject: &params.subject,
            html: &params.html,
            text: params.text.as_deref(),
            from: params.from.as_deref(),
            reply_to: params.reply_to.as_deref(),
            tags: &params.tags,
        }
    }
}

impl<'a> From<&'a SendBulkEmailParams> for Message<'a> {
    fn from(params: &'a SendBulkEmailParams) -> Self {
        Self {
            subject: &params.subject,
            html: &params.html,
            text: params.text.as_deref(),
            from: params.from.as_deref(),
            reply_to: params.reply_to.as_deref(),
            tags: &params.tags,
        }
    }
}

/// SendGrid API request payload
#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress<'a>>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

impl<'a> Personalization<'a> {
    fn to(email: &'a str, name: Option<&'a str>) -> Self {
        Self {
            to: vec![EmailAddress { email, name }],
        }
    }
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    async fn send_email(&self, params: &SendEmailParams) -> DispatchResult<EmailResult> {
        params.validate()?;

        let request = self.request(
            vec![Personalization::to(&params.to, params.to_name.as_deref())],
            params.into(),
        );

        debug!(
            to = %params.to,
            subject = %params.subject,
            "Sending email via SendGrid"
        );

        let context = RetryContext::new("SendGridProvider", "send_email").with_target(&params.to);
        let (status, message_id) =
            with_retry(|| self.post(&request), &self.retry, &context).await?;

        debug!(to = %params.to, message_id = ?message_id, "Email sent via SendGrid");

        Ok(EmailResult::sent(message_id, Some(status)))
    }

    async fn send_bulk_email(
        &self,
        params: &SendBulkEmailParams,
    ) -> DispatchResult<BulkEmailResult> {
        params.validate_content()?;

        let mut result = BulkEmailResult::empty();

        if params.recipients.iter().any(|r| r.email.trim().is_empty()) {
            warn!(
                provider = PROVIDER,
                recipients = params.recipients.len(),
                "Bulk send rejected: recipient address is required"
            );
            for recipient in &params.recipients {
                result.record_failed(&recipient.email, "recipient address is required");
            }
            return Ok(result);
        }

        let mut failures: Vec<(usize, &str, String)> = Vec::new();

        for (batch_no, batch) in params.recipients.chunks(MAX_PERSONALIZATIONS).enumerate() {
            let offset = batch_no * MAX_PERSONALIZATIONS;
            let personalizations = batch
                .iter()
                .map(|r| Personalization::to(&r.email, r.name.as_deref()))
                .collect();
            let request = self.request(personalizations, params.into());

            debug!(
                provider = PROVIDER,
                batch = batch_no,
                recipients = batch.len(),
                "Sending bulk batch via SendGrid"
            );

            let context = RetryContext::new("SendGridProvider", "send_bulk_email")
                .with_target(&batch[0].email);

            match with_retry(|| self.post(&request), &self.retry, &context).await {
                Ok((_, message_id)) => result.record_sent(batch.len(), message_id),
                Err(err) => {
                    let message = match &err {
                        EmailError::Api { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    failures.extend(
                        batch
                            .iter()
                            .enumerate()
                            .map(|(i, r)| (offset + i, r.email.as_str(), message.clone())),
                    );
                }
            }
        }

        failures.sort_by_key(|(i, _, _)| *i);
        for (_, email, error) in failures {
            result.record_failed(email, error);
        }

        info!(
            provider = PROVIDER,
            total_sent = result.total_sent,
            failed = result.failed.len(),
            "Bulk send finished"
        );

        Ok(result)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let provider = SendGridProvider::new("SG.key", "news@example.com");
        let params = SendEmailParams::new("a@x.com", "Hello", "<p>Hi</p>")
            .with_to_name("Ada")
            .with_text("Hi")
            .with_reply_to("reply@example.com")
            .with_tags(["newsletter"]);
        let request = provider.request(
            vec![Personalization::to(&params.to, params.to_name.as_deref())],
            (&params).into(),
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["personalizations"][0]["to"][0]["email"], "a@x.com");
        assert_eq!(json["personalizations"][0]["to"][0]["name"], "Ada");
        assert_eq!(json["from"]["email"], "news@example.com");
        assert_eq!(json["reply_to"]["email"], "reply@example.com");
        assert_eq!(json["content"][0]["type"], "text/plain");
        assert_eq!(json["content"][1]["type"], "text/html");
        assert_eq!(json["categories"][0], "newsletter");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let provider = SendGridProvider::new("SG.key", "news@example.com");
        let params = SendEmailParams::new("a@x.com", "Hello", "<p>Hi</p>")
            .with_from("override@example.com");
        let request = provider.request(vec![Personalization::to("a@x.com", None)], (&params).into());

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["from"]["email"], "override@example.com");
        assert!(json.get("reply_to").is_none());
        assert!(json.get("categories").is_none());
        assert!(json["personalizations"][0]["to"][0].get("name").is_none());
        assert_eq!(json["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider = SendGridProvider::new("k", "f@x.com").with_base_url("http://localhost:1/");
        assert_eq!(provider.endpoint(), "http://localhost:1/v3/mail/send");
    }
}
