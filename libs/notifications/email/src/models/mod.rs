use crate::error::{DispatchResult, EmailError};
use serde::{Deserialize, Serialize};

/// One message to one recipient
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailParams {
    /// Recipient email address
    pub to: String,
    /// Recipient display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
    pub subject: String,
    /// Pre-rendered HTML body
    pub html: String,
    /// Plain text alternative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sender override (defaults to the provider's configured from address)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Categorization metadata passed through to the provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl SendEmailParams {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_to_name(mut self, name: impl Into<String>) -> Self {
        self.to_name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Reject params no provider would accept, before any network call
    pub fn validate(&self) -> DispatchResult<()> {
        require("recipient address", &self.to)?;
        require("subject", &self.subject)?;
        require("html body", &self.html)
    }
}

/// A bulk recipient
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRecipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Appended to the message tags for this recipient only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl BulkRecipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&str> for BulkRecipient {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for BulkRecipient {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

/// The same message to many recipients.
///
/// The recipient list is sent as given; duplicates become separate messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkEmailParams {
    pub recipients: Vec<BulkRecipient>,
    pub subject: String,
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl SendBulkEmailParams {
    pub fn new<I, R>(recipients: I, subject: impl Into<String>, html: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<BulkRecipient>,
    {
        Self {
            recipients: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check the fields shared by every message. Recipients are checked per send.
    pub fn validate_content(&self) -> DispatchResult<()> {
        require("subject", &self.subject)?;
        require("html body", &self.html)
    }

    /// Single-send params for one recipient of this bulk message
    pub fn params_for(&self, recipient: &BulkRecipient) -> SendEmailParams {
        let mut tags = self.tags.clone();
        tags.extend(recipient.tags.iter().cloned());

        SendEmailParams {
            to: recipient.email.clone(),
            to_name: recipient.name.clone(),
            subject: self.subject.clone(),
            html: self.html.clone(),
            text: self.text.clone(),
            from: self.from.clone(),
            reply_to: self.reply_to.clone(),
            tags,
        }
    }
}

fn require(field: &str, value: &str) -> DispatchResult<()> {
    if value.trim().is_empty() {
        return Err(EmailError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Outcome of one send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResult {
    pub success: bool,
    /// Provider-assigned id, opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl EmailResult {
    pub fn sent(message_id: Option<String>, status_code: Option<u16>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
            status_code,
        }
    }

    pub fn failed(error: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            status_code,
        }
    }
}

impl From<&EmailError> for EmailResult {
    fn from(err: &EmailError) -> Self {
        Self::failed(err.to_string(), err.status_code())
    }
}

/// A recipient that did not get the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecipient {
    pub email: String,
    pub error: String,
}

/// Outcome of one bulk operation.
///
/// `success` is true iff `failed` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEmailResult {
    pub success: bool,
    pub total_sent: usize,
    /// In recipient order
    pub failed: Vec<FailedRecipient>,
    /// Ids of accepted messages, in no particular order
    pub message_ids: Vec<String>,
}

impl Default for BulkEmailResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl BulkEmailResult {
    /// Nothing sent, nothing failed
    pub fn empty() -> Self {
        Self {
            success: true,
            total_sent: 0,
            failed: Vec::new(),
            message_ids: Vec::new(),
        }
    }

    pub(crate) fn record_sent(&mut self, count: usize, message_id: Option<String>) {
        self.total_sent += count;
        self.message_ids.extend(message_id);
    }

    pub(crate) fn record_failed(&mut self, email: impl Into<String>, error: impl Into<String>) {
        self.failed.push(FailedRecipient {
            email: email.into(),
            error: error.into(),
        });
        self.success = false;
    }

    /// Recipients that were processed, sent or not
    pub fn total_processed(&self) -> usize {
        self.total_sent + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_required_fields() {
        assert!(SendEmailParams::new("a@x.com", "Hi", "<p>Hi</p>").validate().is_ok());

        let err = SendEmailParams::new("", "Hi", "<p>Hi</p>").validate().unwrap_err();
        assert!(err.to_string().contains("recipient address"));

        let err = SendEmailParams::new("a@x.com", "  ", "<p>Hi</p>").validate().unwrap_err();
        assert!(err.to_string().contains("subject"));

        let err = SendEmailParams::new("a@x.com", "Hi", "").validate().unwrap_err();
        assert!(err.to_string().contains("html body"));
    }

    #[test]
    fn test_params_for_merges_recipient_fields() {
        let bulk = SendBulkEmailParams::new(
            vec![BulkRecipient::new("a@x.com")
                .with_name("Ada")
                .with_tags(["vip"])],
            "Subject",
            "<p>Body</p>",
        )
        .with_text("Body")
        .with_reply_to("reply@x.com")
        .with_tags(["newsletter"]);

        let params = bulk.params_for(&bulk.recipients[0]);

        assert_eq!(params.to, "a@x.com");
        assert_eq!(params.to_name.as_deref(), Some("Ada"));
        assert_eq!(params.text.as_deref(), Some("Body"));
        assert_eq!(params.reply_to.as_deref(), Some("reply@x.com"));
        assert_eq!(params.tags, vec!["newsletter", "vip"]);
    }

    #[test]
    fn test_bulk_result_serializes_camel_case() {
        let mut result = BulkEmailResult::empty();
        result.record_sent(1, Some("m-1".into()));
        result.record_failed("b@x.com", "rejected");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["totalSent"], 1);
        assert_eq!(json["failed"][0]["email"], "b@x.com");
        assert_eq!(json["messageIds"][0], "m-1");
    }

    #[test]
    fn test_email_result_from_error_keeps_status() {
        let err = EmailError::Api {
            provider: "sendgrid",
            status: 401,
            message: "bad key".into(),
            body: String::new(),
        };

        let result = EmailResult::from(&err);
        assert!(!result.success);
        assert_eq!(result.status_code, Some(401));
        assert!(result.error.unwrap().contains("bad key"));
    }
}
