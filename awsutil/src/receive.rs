//! The receive loop: poll a queue, append payloads to a JSONL file, optionally
//! delete what was written, sleep, repeat.
//!
//! Lines are compact JSON (`{"alerts":[1,2]}`), so they compare equal to the
//! published payload as values but not byte for byte with pretty or
//! space-separated renderings such as `{"alerts": [1, 2]}`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::extract::extract;
use crate::sqs::{queue_name, QueueClient, QueueMessage};

/// What is written for each received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The payload unwrapped from the notification envelope.
    #[default]
    Payload,
    /// The queue message as received.
    FullMessage,
}

/// What to do when a message body is not a notification envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Log, leave it on the queue, continue with the next message.
    #[default]
    Skip,
    /// Stop the loop with the error.
    Abort,
}

#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    pub queue_url: String,
    pub delete: bool,
    pub out_file: PathBuf,
    pub polling_frequency: Duration,
    pub max_messages: i32,
    pub visibility_timeout_secs: i32,
    pub output: OutputMode,
    pub on_malformed: MalformedPolicy,
}

/// Counts for one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub received: usize,
    pub written: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// `out/<queue-name>_events.jsonl` under `out_dir`.
#[must_use]
pub fn default_out_file(out_dir: &Path, queue_url: &str) -> PathBuf {
    out_dir.join(format!("{}_events.jsonl", queue_name(queue_url)))
}

/// Append `value` as one line to `path`, creating the file and its parent
/// directory when missing. The file is closed before returning.
///
/// # Errors
///
/// `Io` when the directory or file cannot be created or written.
pub async fn append_json_line(path: &Path, value: &Value) -> AppResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::io(dir, e))?;
    }

    let mut line = value.to_string();
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AppError::io(path, e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| AppError::io(path, e))?;
    file.flush().await.map_err(|e| AppError::io(path, e))?;
    Ok(())
}

pub struct ReceiveLoop<Q> {
    client: Q,
    options: ReceiveOptions,
}

impl<Q: QueueClient> ReceiveLoop<Q> {
    #[must_use]
    pub const fn new(client: Q, options: ReceiveOptions) -> Self {
        Self { client, options }
    }

    /// Poll until `shutdown` is cancelled. Cancellation is observed before each
    /// poll and during the sleep; an in-flight batch is always finished.
    ///
    /// # Errors
    ///
    /// Any error from a cycle other than a skipped malformed message.
    pub async fn run(&self, shutdown: CancellationToken) -> AppResult<()> {
        let opts = &self.options;
        info!(
            queue_url = %opts.queue_url,
            out_file = %opts.out_file.display(),
            delete = opts.delete,
            polling_frequency_secs = opts.polling_frequency.as_secs_f64(),
            "waiting for messages (Ctrl+C to stop)"
        );

        while !shutdown.is_cancelled() {
            let report = self.poll_once().await?;
            if report.received > 0 {
                info!(
                    received = report.received,
                    written = report.written,
                    deleted = report.deleted,
                    skipped = report.skipped,
                    "batch processed"
                );
            }

            debug!(secs = opts.polling_frequency.as_secs_f64(), "waiting");
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(opts.polling_frequency) => {}
            }
        }

        info!("receive loop stopped");
        Ok(())
    }

    /// One Polling step: receive a batch and process it in order.
    ///
    /// # Errors
    ///
    /// Receive, write and delete failures; malformed messages only under
    /// `MalformedPolicy::Abort`.
    pub async fn poll_once(&self) -> AppResult<CycleReport> {
        let opts = &self.options;
        debug!(queue_url = %opts.queue_url, "polling");

        let messages = self
            .client
            .receive(&opts.queue_url, opts.max_messages, opts.visibility_timeout_secs)
            .await?;

        let mut report = CycleReport {
            received: messages.len(),
            ..CycleReport::default()
        };
        if messages.is_empty() {
            info!("no messages");
            return Ok(report);
        }
        info!(count = messages.len(), "found messages");

        for message in &messages {
            match self.process_message(message).await {
                Ok(deleted) => {
                    report.written += 1;
                    report.deleted += usize::from(deleted);
                }
                Err(e) if e.is_malformed_message() && opts.on_malformed == MalformedPolicy::Skip => {
                    warn!(error = %e, "skipping message");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Write one message, then delete it if configured. Returns whether it
    /// was deleted.
    async fn process_message(&self, message: &QueueMessage) -> AppResult<bool> {
        let opts = &self.options;
        let line = match opts.output {
            OutputMode::Payload => extract(message)?,
            OutputMode::FullMessage => serde_json::to_value(message)
                .map_err(|e| AppError::MalformedMessage(e.to_string()))?,
        };

        append_json_line(&opts.out_file, &line).await?;

        if !opts.delete {
            return Ok(false);
        }
        self.client
            .delete(&opts.queue_url, &message.receipt_handle)
            .await?;
        debug!(message_id = message.message_id.as_deref(), "message deleted");
        Ok(true)
    }
}
