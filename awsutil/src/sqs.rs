//! Queue client: receive, delete, purge and list against SQS.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// SQS never returns more than ten messages per receive.
pub const DEFAULT_MAX_MESSAGES: i32 = 10;
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 1200;

/// A single delivery of a queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    /// One-time token needed to delete this delivery.
    pub receipt_handle: String,
    /// Raw body, normally a JSON notification envelope.
    pub body: String,
}

/// Operations the receive loop and the admin commands need from a queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `max_messages`. An empty vec means the queue had nothing.
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        visibility_timeout_secs: i32,
    ) -> AppResult<Vec<QueueMessage>>;

    /// Acknowledge a delivery. A stale handle is reported as `NotFound`.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> AppResult<()>;

    /// Drop every message in the queue. The service rate-limits repeated purges.
    async fn purge(&self, queue_url: &str) -> AppResult<()>;

    /// All queue URLs visible to the caller.
    async fn list(&self) -> AppResult<Vec<String>>;
}

/// `QueueClient` backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        visibility_timeout_secs: i32,
    ) -> AppResult<Vec<QueueMessage>> {
        debug!(queue_url, max_messages, visibility_timeout_secs, "receive_message");
        let out = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .visibility_timeout(visibility_timeout_secs)
            .send()
            .await
            .map_err(|e| AppError::service("ReceiveMessage", DisplayErrorContext(&e).to_string()))?;

        let messages = out
            .messages()
            .iter()
            .filter_map(|m| {
                let Some(receipt_handle) = m.receipt_handle() else {
                    warn!(message_id = m.message_id(), "message without receipt handle, ignoring");
                    return None;
                };
                Some(QueueMessage {
                    message_id: m.message_id().map(ToString::to_string),
                    receipt_handle: receipt_handle.to_string(),
                    body: m.body().unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> AppResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                let stale = e.as_service_error().is_some_and(|se| {
                    se.is_receipt_handle_is_invalid() || se.is_invalid_id_format()
                });
                if stale {
                    AppError::NotFound(format!("receipt handle {receipt_handle}"))
                } else {
                    AppError::service("DeleteMessage", DisplayErrorContext(&e).to_string())
                }
            })?;
        Ok(())
    }

    async fn purge(&self, queue_url: &str) -> AppResult<()> {
        self.client
            .purge_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|e| AppError::service("PurgeQueue", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        let mut queues = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let out = self
                .client
                .list_queues()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AppError::service("ListQueues", DisplayErrorContext(&e).to_string()))?;

            queues.extend(out.queue_urls().iter().cloned());

            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(queues)
    }
}

/// Queue name from a queue URL (`.../123456789012/orders` gives `orders`).
/// Identifiers without a path are returned unchanged.
#[must_use]
pub fn queue_name(queue_url: &str) -> &str {
    queue_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(queue_url)
}
