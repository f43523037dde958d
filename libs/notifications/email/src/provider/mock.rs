//! Mock email provider for testing

use super::EmailProvider;
use crate::bulk::BulkDispatcher;
use crate::error::{DispatchResult, EmailError};
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Mock email provider that captures sent emails.
///
/// Failures are permanent `400` API errors so they are never retried.
pub struct MockEmailProvider {
    sent_emails: Arc<Mutex<Vec<SendEmailParams>>>,
    fail_all: Option<String>,
    failing_addresses: HashSet<String>,
    bulk: BulkDispatcher,
}

impl MockEmailProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            fail_all: None,
            failing_addresses: HashSet::new(),
            bulk: BulkDispatcher::default(),
        }
    }

    /// Create a mock provider that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_all: Some(message.into()),
            ..Self::new()
        }
    }

    /// Fail only for these recipient addresses
    pub fn failing_for<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Get all sent emails
    pub async fn sent_emails(&self) -> Vec<SendEmailParams> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Clear all sent emails
    pub async fn clear(&self) {
        self.sent_emails.lock().await.clear();
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to == email)
    }

    fn failure_for(&self, to: &str) -> Option<String> {
        if let Some(message) = &self.fail_all {
            return Some(message.clone());
        }
        self.failing_addresses
            .contains(to)
            .then(|| format!("Mock rejected {}", to))
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send_email(&self, params: &SendEmailParams) -> DispatchResult<EmailResult> {
        params.validate()?;

        if let Some(message) = self.failure_for(&params.to) {
            return Err(EmailError::Api {
                provider: "mock",
                status: 400,
                message,
                body: String::new(),
            });
        }

        self.sent_emails.lock().await.push(params.clone());

        Ok(EmailResult::sent(
            Some(format!("mock-{}", Uuid::new_v4())),
            Some(202),
        ))
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
        "mock"
    }
}
