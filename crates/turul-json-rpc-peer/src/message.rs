//! Structural classification of inbound JSON values.
//!
//! JSON-RPC envelopes carry no type tag, so a decoded value is sorted into
//! [`IncomingMessage`] once, at the boundary, and the rest of the pipeline
//! matches on the variant.

use serde_json::{Map, Value};

use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcResponse;
use crate::types::RequestId;
use crate::JSONRPC_VERSION;

/// One inbound envelope, classified by shape
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Call expecting a reply
    Request(JsonRpcRequest),
    /// Call without an id; never replied to
    Notification(JsonRpcNotification),
    /// Successful reply to one of our calls
    Response(JsonRpcResponse),
    /// Error reply to one of our calls (id may be unknown)
    Error(JsonRpcError),
    /// Success reply whose id cannot be matched to any call
    StrayResponse { reason: String },
    /// Well-formed JSON that is not a JSON-RPC envelope
    Malformed {
        id: Option<RequestId>,
        reason: String,
    },
}

impl IncomingMessage {
    /// Classify a decoded value. First match wins:
    /// `error` member, then `result` + `id`, then `method`.
    ///
    /// Response-shaped values always land in `Error`, `Response` or
    /// `StrayResponse`, however badly formed.
    pub fn classify(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::malformed(None, "message must be a JSON object");
        };

        let id = extract_id(&map);

        if let Some(error) = map.remove("error") {
            return IncomingMessage::Error(JsonRpcError::new(id, error_object(error)));
        }

        if map.contains_key("id") {
            if let Some(result) = map.remove("result") {
                return match id {
                    Some(id) => IncomingMessage::Response(JsonRpcResponse::new(id, result)),
                    None => IncomingMessage::StrayResponse {
                        reason: format!(
                            "unusable response id {}",
                            map.get("id").unwrap_or(&Value::Null)
                        ),
                    },
                };
            }
        }

        if let Some(version) = map.get("jsonrpc") {
            if version.as_str() != Some(JSONRPC_VERSION) {
                return Self::malformed(id, format!("unsupported jsonrpc version {}", version));
            }
        }

        if map.contains_key("method") {
            let has_id = map.get("id").is_some_and(|v| !v.is_null());
            return if has_id {
                match serde_json::from_value::<JsonRpcRequest>(Value::Object(map)) {
                    Ok(request) => IncomingMessage::Request(request),
                    Err(e) => Self::malformed(id, format!("invalid request: {}", e)),
                }
            } else {
                match serde_json::from_value::<JsonRpcNotification>(Value::Object(map)) {
                    Ok(notification) => IncomingMessage::Notification(notification),
                    Err(e) => Self::malformed(None, format!("invalid notification: {}", e)),
                }
            };
        }

        Self::malformed(id, "message matches no JSON-RPC envelope shape")
    }

    fn malformed(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        IncomingMessage::Malformed {
            id,
            reason: reason.into(),
        }
    }
}

fn extract_id(map: &Map<String, Value>) -> Option<RequestId> {
    map.get("id")
        .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
}

/// Best-effort reading of a peer's `error` member.
///
/// An object with an integer `code` keeps that code, falling back to the
/// catalog message when `message` is absent. Anything else becomes
/// INTERNAL_ERROR carrying the raw value as `data`.
fn error_object(raw: Value) -> JsonRpcErrorObject {
    if let Ok(error) = serde_json::from_value::<JsonRpcErrorObject>(raw.clone()) {
        return error;
    }

    match raw.get("code").and_then(Value::as_i64) {
        Some(code) => {
            let message = raw
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    JsonRpcErrorCode::from_code(code)
                        .map_or("Unknown error", |known| known.message())
                        .to_string()
                });
            JsonRpcErrorObject {
                code,
                message,
                data: raw.get("data").cloned(),
            }
        }
        None => JsonRpcErrorObject::internal_error(Some(raw)),
    }
}
