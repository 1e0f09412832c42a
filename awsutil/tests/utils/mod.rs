//! In-memory fakes of the client traits

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use awsutil::sns::{MessageAttributes, NotificationClient};
use awsutil::sqs::{QueueClient, QueueMessage};
use awsutil::{AppError, AppResult};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct QueueState {
    batches: VecDeque<AppResult<Vec<QueueMessage>>>,
    receive_calls: usize,
    deleted: Vec<String>,
    stale_handles: Vec<String>,
}

/// Queue that hands out scripted batches and records deletes.
///
/// Once the script is exhausted it returns empty batches and, if a shutdown
/// token was attached, cancels it.
#[derive(Clone, Default)]
pub struct FakeQueue {
    state: Arc<Mutex<QueueState>>,
    shutdown: Option<CancellationToken>,
}

impl FakeQueue {
    pub fn with_batches(batches: Vec<Vec<QueueMessage>>) -> Self {
        let queue = Self::default();
        queue.state.lock().unwrap().batches = batches.into_iter().map(Ok).collect();
        queue
    }

    pub fn stop_when_drained(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn push_error(&self, err: AppError) {
        self.state.lock().unwrap().batches.push_back(Err(err));
    }

    pub fn mark_stale(&self, receipt_handle: &str) {
        self.state
            .lock()
            .unwrap()
            .stale_handles
            .push(receipt_handle.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.state.lock().unwrap().receive_calls
    }
}

#[async_trait]
impl QueueClient for FakeQueue {
    async fn receive(
        &self,
        _queue_url: &str,
        _max_messages: i32,
        _visibility_timeout_secs: i32,
    ) -> AppResult<Vec<QueueMessage>> {
        let mut state = self.state.lock().unwrap();
        state.receive_calls += 1;
        match state.batches.pop_front() {
            Some(batch) => batch,
            None => {
                if let Some(token) = &self.shutdown {
                    token.cancel();
                }
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.stale_handles.iter().any(|h| h == receipt_handle) {
            return Err(AppError::NotFound(format!("receipt handle {receipt_handle}")));
        }
        state.deleted.push(receipt_handle.to_string());
        Ok(())
    }

    async fn purge(&self, _queue_url: &str) -> AppResult<()> {
        self.state.lock().unwrap().batches.clear();
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// A captured publish call
#[derive(Debug, Clone)]
pub struct Published {
    pub topic_arn: String,
    pub message: String,
    pub attributes: MessageAttributes,
}

#[derive(Clone, Default)]
pub struct FakeTopic {
    published: Arc<Mutex<Vec<Published>>>,
}

impl FakeTopic {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationClient for FakeTopic {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> AppResult<Option<String>> {
        let mut published = self.published.lock().unwrap();
        published.push(Published {
            topic_arn: topic_arn.to_string(),
            message: message.to_string(),
            attributes: attributes.clone(),
        });
        Ok(Some(format!("msg-{}", published.len())))
    }
}

pub fn message(id: &str, body: &str) -> QueueMessage {
    QueueMessage {
        message_id: Some(id.to_string()),
        receipt_handle: format!("rh-{id}"),
        body: body.to_string(),
    }
}

/// Queue message as a topic subscription would deliver `payload`.
pub fn notification(id: &str, payload: &serde_json::Value) -> QueueMessage {
    let body = serde_json::json!({
        "Type": "Notification",
        "Message": payload.to_string(),
    });
    message(id, &body.to_string())
}
