//! WIP wire envelopes
//!
//! Every frame is one of a request (client to server), a response carrying
//! the request's `id`, or a notification carrying an event `method`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command request
#[derive(Debug, Clone, Serialize)]
pub struct WipRequest<'a> {
    /// Sequence number, unique per session
    pub id: u64,
    /// `<Domain>.<command>`
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

/// Response to a command
#[derive(Debug, Clone, Deserialize)]
pub struct WipRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<WipErrorDetail>,
}

/// Error object of a failed command
#[derive(Debug, Clone, Deserialize)]
pub struct WipErrorDetail {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Unsolicited event
#[derive(Debug, Clone, Deserialize)]
pub struct WipNotification {
    /// `<Domain>.<event>`
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Decoded incoming frame
#[derive(Debug, Clone)]
pub enum WipMessage {
    Response(WipRpcResponse),
    Notification(WipNotification),
}

impl WipMessage {
    /// Classify a frame; responses are recognised by their `id`
    pub fn parse(frame: &str) -> crate::Result<Self> {
        let value: Value = serde_json::from_str(frame)?;
        if value.get("id").is_some_and(|id| !id.is_null()) {
            Ok(WipMessage::Response(serde_json::from_value(value)?))
        } else if value.get("method").is_some() {
            Ok(WipMessage::Notification(serde_json::from_value(value)?))
        } else {
            Err(crate::Error::ProtocolMissingField {
                field: "id".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!({ "scriptId": "12" });
        let request = WipRequest {
            id: 1,
            method: "Debugger.getScriptSource",
            params: Some(&params),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({ "id": 1, "method": "Debugger.getScriptSource", "params": { "scriptId": "12" } })
        );
    }

    #[test]
    fn test_request_without_params() {
        let request = WipRequest {
            id: 2,
            method: "Debugger.enable",
            params: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn test_parse_response_and_event() {
        let reply = WipMessage::parse(r#"{"id":3,"error":{"code":-32000,"message":"No script"}}"#).unwrap();
        match reply {
            WipMessage::Response(response) => {
                assert_eq!(response.id, 3);
                assert_eq!(response.error.unwrap().code, -32000);
            }
            other => panic!("expected response, got {:?}", other),
        }

        let event = WipMessage::parse(r#"{"method":"Debugger.resumed"}"#).unwrap();
        assert!(matches!(event, WipMessage::Notification(n) if n.method == "Debugger.resumed" && n.params.is_none()));

        assert!(WipMessage::parse(r#"{"result":{}}"#).is_err());
        assert!(WipMessage::parse("not json").is_err());
    }
}
