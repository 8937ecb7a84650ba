//! Service response envelope.
//!
//! Every response of the device-management service is a JSON object of the
//! form `{"success": bool, ...payload}`. Where the payload lives differs per
//! endpoint (`data`, `disks`, or the top level), so the envelope keeps the
//! remaining fields as a map and lets the caller pick.

use crate::error::OperationFailure;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured error body carried by a failed response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Anything else the service sent, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorPayload {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Parse an error body, if the response carried a JSON object
    pub fn from_body(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }
}

/// Acknowledgement of an operation whose only payload is its success flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl OperationResult {
    pub fn acknowledged() -> Self {
        Self {
            success: true,
            error: None,
        }
    }
}

fn default_success() -> bool {
    true
}

/// A decoded `{success, ...payload}` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Responses without the flag are treated as successful
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Envelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, OperationFailure> {
        serde_json::from_slice(bytes)
            .map_err(|e| OperationFailure::Decode(format!("invalid response envelope: {}", e)))
    }

    /// Deserialize one named payload field, e.g. `data` or `disks`
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<T, OperationFailure> {
        let value = self
            .body
            .get(key)
            .cloned()
            .ok_or_else(|| OperationFailure::Decode(format!("missing field '{}'", key)))?;
        serde_json::from_value(value)
            .map_err(|e| OperationFailure::Decode(format!("field '{}': {}", key, e)))
    }

    /// Deserialize the payload when it sits at the top level of the envelope
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, OperationFailure> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|e| OperationFailure::Decode(e.to_string()))
    }

    pub fn into_error_payload(self) -> ErrorPayload {
        let mut extra = self.body;
        let message = match extra.remove("message") {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                extra.insert("message".to_string(), other);
                None
            }
            None => None,
        };
        ErrorPayload {
            success: Some(self.success),
            message,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessSettings, Device, Disk};

    #[test]
    fn test_top_level_payload() {
        let env = Envelope::parse(br#"{"device_domain": "test.syncloud.it", "success": true}"#)
            .unwrap();
        assert!(env.success);
        let device: Device = env.body().unwrap();
        assert_eq!(device.domain, "test.syncloud.it");
    }

    #[test]
    fn test_named_field_payload() {
        let env = Envelope::parse(
            br#"{"data": {"external_access": false, "protocol": "http"}, "success": true}"#,
        )
        .unwrap();
        let access: AccessSettings = env.field("data").unwrap();
        assert!(!access.external_access_enabled);
    }

    #[test]
    fn test_missing_field_is_decode_failure() {
        let env = Envelope::parse(br#"{"success": true}"#).unwrap();
        let err = env.field::<Vec<Disk>>("disks").unwrap_err();
        assert!(matches!(err, OperationFailure::Decode(_)));
    }

    #[test]
    fn test_missing_success_defaults_to_true() {
        let env = Envelope::parse(br#"{"disks": []}"#).unwrap();
        assert!(env.success);
    }

    #[test]
    fn test_not_json_is_decode_failure() {
        assert!(matches!(
            Envelope::parse(b"<html>oops</html>"),
            Err(OperationFailure::Decode(_))
        ));
    }

    #[test]
    fn test_into_error_payload_keeps_message_and_extras() {
        let env = Envelope::parse(
            br#"{"success": false, "message": "disk busy", "parameters_messages": []}"#,
        )
        .unwrap();
        let payload = env.into_error_payload();
        assert_eq!(payload.success, Some(false));
        assert_eq!(payload.message(), Some("disk busy"));
        assert!(payload.extra.contains_key("parameters_messages"));
    }

    #[test]
    fn test_error_payload_from_non_json_body() {
        assert!(ErrorPayload::from_body(b"Bad Gateway").is_none());
        assert!(ErrorPayload::from_body(b"[1,2]").is_none());
        let payload = ErrorPayload::from_body(br#"{"message": "nope"}"#).unwrap();
        assert_eq!(payload.message(), Some("nope"));
    }
}
