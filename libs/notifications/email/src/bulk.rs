//! Fan-out bulk dispatch for providers without a native bulk endpoint.

use crate::config::DEFAULT_BULK_CONCURRENCY;
use crate::error::DispatchResult;
use crate::models::{BulkEmailResult, EmailResult, SendBulkEmailParams, SendEmailParams};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::{debug, info};

/// Drives one single-send per recipient, at most `concurrency` in flight,
/// and merges the outcomes into a [`BulkEmailResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDispatcher {
    concurrency: usize,
}

impl Default for BulkDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BULK_CONCURRENCY)
    }
}

impl BulkDispatcher {
    /// A width of 0 is treated as 1
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Send `params` to every recipient through `send_one`.
    ///
    /// Waits for every send. Individual failures land in `failed` (in
    /// recipient order) and never fail the call; only invalid shared content
    /// is returned as an error, before any send is issued.
    pub async fn dispatch<F, Fut>(
        &self,
        params: &SendBulkEmailParams,
        send_one: F,
    ) -> DispatchResult<BulkEmailResult>
    where
        F: Fn(SendEmailParams) -> Fut,
        Fut: Future<Output = DispatchResult<EmailResult>>,
    {
        params.validate_content()?;

        if params.recipients.is_empty() {
            return Ok(BulkEmailResult::empty());
        }

        debug!(
            recipients = params.recipients.len(),
            concurrency = self.concurrency,
            "Fanning out bulk send"
        );

        let jobs: Vec<(usize, String, SendEmailParams)> = params
            .recipients
            .iter()
            .enumerate()
            .map(|(index, recipient)| (index, recipient.email.clone(), params.params_for(recipient)))
            .collect();

        let mut outcomes: Vec<(usize, String, DispatchResult<EmailResult>)> = stream::iter(jobs)
            .map(|(index, email, single)| {
                let send = send_one(single);
                async move { (index, email, send.await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut result = BulkEmailResult::empty();
        for (_, email, outcome) in outcomes {
            match outcome {
                Ok(sent) if sent.success => result.record_sent(1, sent.message_id),
                Ok(rejected) => result.record_failed(
                    email,
                    rejected.error.unwrap_or_else(|| "Failed to send".to_string()),
                ),
                Err(err) => result.record_failed(email, err.to_string()),
            }
        }

        info!(
            total_sent = result.total_sent,
            failed = result.failed.len(),
            "Bulk send finished"
        );

        Ok(result)
    }
}
