use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(Map<String, Value>),
}

impl RequestParams {
    /// Build params from an arbitrary JSON value.
    ///
    /// Only arrays and objects are valid parameter structures; anything else
    /// yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(RequestParams::Array(items)),
            Value::Object(map) => Some(RequestParams::Object(map)),
            _ => None,
        }
    }

    /// Get a parameter by name (for object params)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map),
            RequestParams::Array(arr) => Value::Array(arr),
        }
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(vec: Vec<Value>) -> Self {
        RequestParams::Array(vec)
    }
}

/// A JSON-RPC request that expects a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc", default)]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: String, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method,
            params,
        }
    }

    pub fn new_no_params(id: RequestId, method: String) -> Self {
        Self::new(id, method, None)
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_request_serialization() {
        let request =
            JsonRpcRequest::new_no_params(RequestId::Number(1), "test_method".to_string());

        let json = to_string(&request).unwrap();
        assert!(!json.contains("params"));
        let parsed: JsonRpcRequest = from_str(&json).unwrap();

        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.method, "test_method");
        assert!(parsed.params.is_none());
    }

    #[test]
    fn test_params_from_value() {
        let object = RequestParams::from_value(json!({"name": "test", "value": 42})).unwrap();
        assert_eq!(object.get("name"), Some(&json!("test")));
        assert_eq!(object.get("missing"), None);

        let array = RequestParams::from_value(json!(["first", 2])).unwrap();
        assert_eq!(array.get("first"), None);
        assert_eq!(array.into_value(), json!(["first", 2]));

        assert!(RequestParams::from_value(json!(3)).is_none());
        assert!(RequestParams::from_value(Value::Null).is_none());
    }

    #[test]
    fn test_request_with_params_round_trip() {
        let request = JsonRpcRequest::new(
            RequestId::String("req1".to_string()),
            "set_value".to_string(),
            RequestParams::from_value(json!({"value": 42})),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": "req1", "method": "set_value", "params": {"value": 42}})
        );
        assert_eq!(request.get_param("value"), Some(&json!(42)));
    }
}
