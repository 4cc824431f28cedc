use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// No response arrived within the call's timeout window
    RequestTimeout,
    /// The engine was shut down while the call was pending
    Cancelled,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => -32700,
            JsonRpcErrorCode::InvalidRequest => -32600,
            JsonRpcErrorCode::MethodNotFound => -32601,
            JsonRpcErrorCode::InvalidParams => -32602,
            JsonRpcErrorCode::InternalError => -32603,
            JsonRpcErrorCode::RequestTimeout => -32099,
            JsonRpcErrorCode::Cancelled => -32098,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::RequestTimeout => "Request timeout",
            JsonRpcErrorCode::Cancelled => "Request cancelled",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }

    /// Look up the catalog entry for a raw code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(JsonRpcErrorCode::ParseError),
            -32600 => Some(JsonRpcErrorCode::InvalidRequest),
            -32601 => Some(JsonRpcErrorCode::MethodNotFound),
            -32602 => Some(JsonRpcErrorCode::InvalidParams),
            -32603 => Some(JsonRpcErrorCode::InternalError),
            -32099 => Some(JsonRpcErrorCode::RequestTimeout),
            -32098 => Some(JsonRpcErrorCode::Cancelled),
            -32097..=-32000 => Some(JsonRpcErrorCode::ServerError(code)),
            _ => None,
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
///
/// Every constructor produces a fresh copy of the catalog row; contextual
/// detail goes in `data` and never replaces the catalog message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    /// Catalog entry with no detail attached
    pub fn from_code(code: JsonRpcErrorCode) -> Self {
        Self::new(code, None, None)
    }

    /// Merge caller-supplied detail into this error
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, data)
    }

    /// The attempted method name is carried as `data`
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            None,
            Some(Value::String(method.to_string())),
        )
    }

    pub fn invalid_params(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, None, data)
    }

    pub fn internal_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, None, data)
    }

    pub fn request_timeout(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::RequestTimeout, None, data)
    }

    pub fn cancelled(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::Cancelled, None, data)
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        assert!(
            (-32099..=-32000).contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }

    pub fn is(&self, code: JsonRpcErrorCode) -> bool {
        self.code == code.code()
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorObject {}

/// JSON-RPC Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc", default)]
    pub version: JsonRpcVersion,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(data))
    }

    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(Some(id), JsonRpcErrorObject::method_not_found(method))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Failure reported by a method handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Generic failure, reported to the caller as an internal error
    #[error("{message}")]
    Failed {
        message: String,
        data: Option<Value>,
    },

    /// A specific JSON-RPC error, passed to the caller unchanged
    #[error("{0}")]
    Rpc(JsonRpcErrorObject),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            data: None,
        }
    }

    pub fn failed_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Failed {
            message: message.into(),
            data: Some(data),
        }
    }

    /// Convert to the error object sent back to the caller.
    ///
    /// `Failed` becomes INTERNAL_ERROR whose `data` is the failure's data,
    /// or its message when there is no data.
    pub fn into_error_object(self) -> JsonRpcErrorObject {
        match self {
            HandlerError::Failed { message, data } => {
                JsonRpcErrorObject::internal_error(Some(data.unwrap_or(Value::String(message))))
            }
            HandlerError::Rpc(error) => error,
        }
    }
}

impl From<JsonRpcErrorObject> for HandlerError {
    fn from(error: JsonRpcErrorObject) -> Self {
        HandlerError::Rpc(error)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        HandlerError::failed(error.to_string())
    }
}

/// Configuration-time misuse of the dispatch registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Method name must not be empty")]
    EmptyMethodName,

    #[error("Method names starting with 'rpc.' are reserved: {0}")]
    ReservedMethodName(String),

    #[error("Parameter names for method '{0}' must not be empty")]
    EmptyParameterName(String),

    #[error("Duplicate parameter '{parameter}' declared for method '{method}'")]
    DuplicateParameter { method: String, parameter: String },
}

/// Failures reported by a transport sink
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the inbound entry point
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("JSON parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Engine has been shut down")]
    ShutDown,
}
