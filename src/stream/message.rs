//! Streaming message type
//!
//! Every message exchanged with the worker is a JSON object carrying a
//! `requestId` plus one content entry keyed by the message type:
//! ```text
//! {"requestId": "r1", "workerInitRequest": {"hostVersion": "4.0"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A concrete message sent to or received from the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingMessage {
    /// Correlates requests with their responses
    #[serde(default)]
    pub request_id: String,
    /// Message content, normally a single `<messageType>: <body>` entry
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl StreamingMessage {
    /// Create a message with a single content entry
    pub fn new(request_id: impl Into<String>, message_type: &str, body: Value) -> Self {
        let mut content = Map::new();
        content.insert(message_type.to_string(), body);
        Self {
            request_id: request_id.into(),
            content,
        }
    }

    /// Create a message with no content entry
    pub fn empty(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content: Map::new(),
        }
    }

    /// The content key, if any
    pub fn message_type(&self) -> Option<&str> {
        self.content.keys().next().map(String::as_str)
    }

    /// The body of the content entry, if any
    pub fn body(&self) -> Option<&Value> {
        self.content.values().next()
    }

    /// JSON view of the whole message, used for matching and validation
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.content.len() + 1);
        map.insert("requestId".to_string(), Value::String(self.request_id.clone()));
        for (key, value) in &self.content {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Short human-readable label for logs and diagnostics
    pub fn describe(&self) -> String {
        format!(
            "{} (requestId={})",
            self.message_type().unwrap_or("<empty>"),
            self.request_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_wire_form() {
        let msg: StreamingMessage = serde_json::from_value(json!({
            "requestId": "r1",
            "workerInitResponse": {"result": {"status": "Success"}}
        }))
        .unwrap();

        assert_eq!(msg.request_id, "r1");
        assert_eq!(msg.message_type(), Some("workerInitResponse"));
        assert_eq!(msg.body().unwrap()["result"]["status"], "Success");
    }

    #[test]
    fn test_missing_request_id_defaults_to_empty() {
        let msg: StreamingMessage = serde_json::from_value(json!({"rpcLog": {}})).unwrap();
        assert_eq!(msg.request_id, "");
        assert_eq!(msg.message_type(), Some("rpcLog"));
    }

    #[test]
    fn test_to_value_includes_request_id() {
        let msg = StreamingMessage::new("r2", "invocationRequest", json!({"functionId": "f"}));
        assert_eq!(
            msg.to_value(),
            json!({"requestId": "r2", "invocationRequest": {"functionId": "f"}})
        );
    }

    #[test]
    fn test_empty_message() {
        let msg = StreamingMessage::empty("r3");
        assert_eq!(msg.message_type(), None);
        assert_eq!(msg.describe(), "<empty> (requestId=r3)");
    }
}
