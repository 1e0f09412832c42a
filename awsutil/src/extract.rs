//! Unwraps notification payloads delivered through a queue subscription.
//!
//! A topic delivers to a queue by wrapping the published message in a JSON
//! envelope whose `Message` field holds the payload as an encoded JSON string:
//!
//! ```json
//! {"Type": "Notification", "Message": "{\"alerts\": [1, 2]}", "MessageAttributes": {...}}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::sqs::QueueMessage;

/// First level of a queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "MessageAttributes", default)]
    pub message_attributes: Option<Map<String, Value>>,
}

/// Parse the envelope out of a queue message body.
///
/// # Errors
///
/// `MalformedMessage` when the body is not JSON, has no `Message` field, or
/// that field is not a string.
pub fn envelope(message: &QueueMessage) -> AppResult<NotificationEnvelope> {
    serde_json::from_str(&message.body).map_err(|e| {
        AppError::MalformedMessage(format!("{}: envelope: {e}", describe(message)))
    })
}

/// Return the payload published to the topic.
///
/// # Errors
///
/// `MalformedMessage` when either level fails to parse.
pub fn extract(message: &QueueMessage) -> AppResult<Value> {
    let envelope = envelope(message)?;
    serde_json::from_str(&envelope.message).map_err(|e| {
        AppError::MalformedMessage(format!("{}: embedded message: {e}", describe(message)))
    })
}

fn describe(message: &QueueMessage) -> String {
    message
        .message_id
        .as_deref()
        .map_or_else(|| "message".to_string(), |id| format!("message {id}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn msg(body: &str) -> QueueMessage {
        QueueMessage {
            message_id: Some("m-1".into()),
            receipt_handle: "rh-1".into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_extract_alerts_payload() {
        let payload = extract(&msg(r#"{"Message": "{\"alerts\": [1,2]}"}"#)).unwrap();
        assert_eq!(payload, json!({"alerts": [1, 2]}));
    }

    #[test]
    fn test_extract_ignores_other_envelope_fields() {
        let body = json!({
            "Type": "Notification",
            "TopicArn": "arn:aws:sns:eu-central-1:000000000000:events",
            "Message": "{\"text\":\"hi\"}",
            "MessageAttributes": {"k": {"Type": "String", "Value": "v"}}
        })
        .to_string();

        let env = envelope(&msg(&body)).unwrap();
        assert_eq!(
            env.message_attributes.unwrap()["k"],
            json!({"Type": "String", "Value": "v"})
        );
        assert_eq!(extract(&msg(&body)).unwrap(), json!({"text": "hi"}));
    }

    #[test]
    fn test_extract_scalar_payload() {
        assert_eq!(extract(&msg(r#"{"Message": "\"plain\""}"#)).unwrap(), json!("plain"));
    }

    #[test]
    fn test_body_not_json() {
        let err = extract(&msg("not json")).unwrap_err();
        assert!(err.is_malformed_message());
        assert!(err.to_string().contains("message m-1"));
    }

    #[test]
    fn test_missing_message_field() {
        let err = extract(&msg(r#"{"Subject": "x"}"#)).unwrap_err();
        assert!(err.is_malformed_message());
    }

    #[test]
    fn test_message_field_not_a_string() {
        let err = extract(&msg(r#"{"Message": {"alerts": []}}"#)).unwrap_err();
        assert!(err.is_malformed_message());
    }

    #[test]
    fn test_embedded_message_not_json() {
        let err = extract(&msg(r#"{"Message": "hello there"}"#)).unwrap_err();
        assert!(err.to_string().contains("embedded message"));
    }
}
