//! Brevo email provider
//!
//! Sends emails via the Brevo transactional API (`POST /v3/smtp/email`). The
//! message id is returned in the JSON body. Brevo has no transactional bulk
//! endpoint, so bulk sends fan out through [`BulkDispatcher`].

use crate::bulk::BulkDispatcher;
use crate::config::BREVO_DEFAULT_URL;
use crate::error::{DispatchResult, EmailError};
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use crate::provider::{api_error_message, EmailProvider};
use async_trait::async_trait;
use reqwest::Client;
use retry::{with_retry, RetryContext, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const PROVIDER: &str = "brevo";

/// Brevo email provider
pub struct BrevoProvider {
    api_key: String,
    from_email: String,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
    bulk: BulkDispatcher,
}

impl BrevoProvider {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_email: from_email.into(),
            base_url: BREVO_DEFAULT_URL.to_string(),
            client: Client::new(),
            retry: RetryPolicy::default(),
            bulk: BulkDispatcher::default(),
        }
    }

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

    pub fn with_bulk(mut self, bulk: BulkDispatcher) -> Self {
        self.bulk = bulk;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v3/smtp/email", self.base_url.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, params: &'a SendEmailParams) -> BrevoRequest<'a> {
        BrevoRequest {
            sender: Contact {
                email: params.from.as_deref().unwrap_or(&self.from_email),
                name: None,
            },
            to: vec![Contact {
                email: &params.to,
                name: params.to_name.as_deref(),
            }],
            subject: &params.subject,
            html_content: &params.html,
            text_content: params.text.as_deref(),
            reply_to: params
                .reply_to
                .as_deref()
                .map(|email| Contact { email, name: None }),
            tags: Some(params.tags.as_slice()).filter(|tags| !tags.is_empty()),
        }
    }

    /// One POST; returns the status and message id on 2xx
    async fn post(&self, request: &BrevoRequest<'_>) -> DispatchResult<(u16, Option<String>)> {
        let response = self
            .client
            .post(self.endpoint())
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| EmailError::Network {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            // An unparseable body still means the message was accepted
            let message_id = serde_json::from_str::<BrevoResponse>(&body)
                .ok()
                .and_then(|r| r.message_id);
            return Ok((status.as_u16(), message_id));
        }

        error!(status = status.as_u16(), error = %body, "Brevo API error");

        Err(EmailError::Api {
            provider: PROVIDER,
            status: status.as_u16(),
            message: api_error_message(&body, "Failed to send email via Brevo"),
            body,
        })
    }
}

/// Brevo API request payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Contact<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrevoResponse {
    message_id: Option<String>,
}

#[async_trait]
impl EmailProvider for BrevoProvider {
    async fn send_email(&self, params: &SendEmailParams) -> DispatchResult<EmailResult> {
        params.validate()?;

        let request = self.request(params);

        debug!(
            to = %params.to,
            subject = %params.subject,
            "Sending email via Brevo"
        );

        let context = RetryContext::new("BrevoProvider", "send_email").with_target(&params.to);
        let (status, message_id) =
            with_retry(|| self.post(&request), &self.retry, &context).await?;

        debug!(to = %params.to, message_id = ?message_id, "Email sent via Brevo");

        Ok(EmailResult::sent(message_id, Some(status)))
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
