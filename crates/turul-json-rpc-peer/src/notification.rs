use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{request::RequestParams, types::JsonRpcVersion};

/// A JSON-RPC notification (request without an id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc", default)]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: String, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method,
            params,
        }
    }

    pub fn new_no_params(method: String) -> Self {
        Self::new(method, None)
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_string};

    #[test]
    fn test_notification_json_format() {
        let notification = JsonRpcNotification::new_no_params("ping".to_string());
        let json_str = to_string(&notification).unwrap();

        // Should not contain an "id" field
        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
        assert!(json_str.contains("\"method\":\"ping\""));
    }

    #[test]
    fn test_notification_with_params() {
        let notification = JsonRpcNotification::new(
            "log".to_string(),
            RequestParams::from_value(json!({"message": "Hello", "level": "info"})),
        );

        assert_eq!(notification.get_param("message"), Some(&json!("Hello")));
        assert_eq!(notification.get_param("level"), Some(&json!("info")));
    }
}
