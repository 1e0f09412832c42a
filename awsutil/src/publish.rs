//! Publish a file-based message to a topic.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::sns::{MessageAttributes, NotificationClient};

/// What gets sent: the message value and its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInput {
    pub message: Value,
    pub attributes: MessageAttributes,
}

impl PublishInput {
    /// Read an input file.
    ///
    /// With `raw` the whole document is the message. Otherwise the document
    /// must be an object with a `Message` key and may carry `MessageAttributes`.
    ///
    /// # Errors
    ///
    /// `FileNotFound` when the file is missing, `MalformedPayload` when it is
    /// not JSON or lacks the expected fields.
    pub async fn from_file(path: &Path, raw: bool) -> AppResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::io(path, e))?;
        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedPayload(format!("{}: {e}", path.display())))?;

        if raw {
            return Ok(Self {
                message: doc,
                attributes: MessageAttributes::new(),
            });
        }
        Self::from_document(doc)
    }

    /// Split an envelope-shaped document into message and attributes.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` when `Message` is missing or the attributes are not a
    /// mapping of `{DataType, StringValue | BinaryValue}` entries.
    pub fn from_document(doc: Value) -> AppResult<Self> {
        let Value::Object(mut obj) = doc else {
            return Err(AppError::MalformedPayload(
                "input must be a JSON object with a Message key".into(),
            ));
        };

        let message = obj
            .remove("Message")
            .or_else(|| obj.remove("message"))
            .ok_or_else(|| AppError::MalformedPayload("missing Message key".into()))?;

        let attributes = match obj
            .remove("MessageAttributes")
            .or_else(|| obj.remove("message_attributes"))
        {
            None | Some(Value::Null) => MessageAttributes::new(),
            Some(raw) => serde_json::from_value::<MessageAttributes>(raw)
                .map_err(|e| AppError::MalformedPayload(format!("MessageAttributes: {e}")))?,
        };

        for (name, attr) in &attributes {
            attr.validate(name)?;
        }

        Ok(Self {
            message,
            attributes,
        })
    }

    /// The message as transmitted: always a JSON-encoded string.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the value cannot be serialized.
    pub fn encoded_message(&self) -> AppResult<String> {
        serde_json::to_string(&self.message)
            .map_err(|e| AppError::MalformedPayload(format!("encoding Message: {e}")))
    }
}

/// Publish `input` to `topic_arn`, returning the service message id.
///
/// # Errors
///
/// Propagates encoding and service errors.
pub async fn publish(
    client: &dyn NotificationClient,
    topic_arn: &str,
    input: &PublishInput,
) -> AppResult<Option<String>> {
    let message = input.encoded_message()?;
    debug!(topic_arn, %message, attributes = input.attributes.len(), "publishing");

    let message_id = client.publish(topic_arn, &message, &input.attributes).await?;
    info!(topic_arn, message_id = message_id.as_deref(), "message published");
    Ok(message_id)
}
