//! Notification client: publish to an SNS topic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::primitives::Blob;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A user attribute sent alongside a published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    #[serde(rename = "DataType")]
    pub data_type: String,
    #[serde(rename = "StringValue", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Sent as the bytes of the given string, not decoded.
    #[serde(rename = "BinaryValue", default, skip_serializing_if = "Option::is_none")]
    pub binary_value: Option<String>,
}

impl MessageAttribute {
    /// Exactly one of `StringValue` and `BinaryValue` must be set.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` naming the attribute otherwise.
    pub fn validate(&self, name: &str) -> AppResult<()> {
        match (&self.string_value, &self.binary_value) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(AppError::MalformedPayload(format!(
                "attribute {name} has neither StringValue nor BinaryValue"
            ))),
            (Some(_), Some(_)) => Err(AppError::MalformedPayload(format!(
                "attribute {name} has both StringValue and BinaryValue"
            ))),
        }
    }

    fn to_wire(&self, name: &str) -> AppResult<MessageAttributeValue> {
        self.validate(name)?;
        MessageAttributeValue::builder()
            .data_type(&self.data_type)
            .set_string_value(self.string_value.clone())
            .set_binary_value(self.binary_value.as_ref().map(|v| Blob::new(v.as_bytes())))
            .build()
            .map_err(|e| AppError::MalformedPayload(format!("attribute {name}: {e}")))
    }
}

/// Attributes keyed by name. Ordered so requests and logs are deterministic.
pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Publish `message`, which must already be an encoded string.
    /// Returns the message id assigned by the service, if any.
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> AppResult<Option<String>>;
}

/// `NotificationClient` backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct SnsNotificationClient {
    client: Client,
}

impl SnsNotificationClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationClient for SnsNotificationClient {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> AppResult<Option<String>> {
        let mut wire = HashMap::with_capacity(attributes.len());
        for (name, attr) in attributes {
            wire.insert(name.clone(), attr.to_wire(name)?);
        }

        let out = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .set_message_attributes((!wire.is_empty()).then_some(wire))
            .send()
            .await
            .map_err(|e| AppError::service("Publish", DisplayErrorContext(&e).to_string()))?;

        Ok(out.message_id().map(ToString::to_string))
    }
}
