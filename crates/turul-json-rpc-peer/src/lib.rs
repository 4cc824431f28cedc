//! # JSON-RPC 2.0 Peer
//!
//! A transport-agnostic JSON-RPC 2.0 engine. One [`JsonRpcEngine`] sits on
//! each end of a connection and acts as both caller and callee: it serves
//! registered methods to the remote side, and issues its own calls and
//! notifications whose responses it correlates back to the waiting caller.
//!
//! ## Features
//! - Method dispatch with named, positional, pass-through or no-argument binding
//! - Outbound calls with per-call timeouts and exactly-once delivery
//! - Inbound and outbound batches (replies kept in input order)
//! - Handler failures and panics isolated into error replies
//! - Opaque routing context passed through to the transport and to handlers
//!
//! ```rust,no_run
//! use turul_json_rpc_peer::prelude::*;
//!
//! # async fn run() {
//! let (transport, _outbound) = ChannelTransport::new();
//! let engine: JsonRpcEngine = JsonRpcEngine::new(transport);
//! engine
//!     .register_fn("echo", BindingMode::Pass, |args, _ctx| async move {
//!         Ok(args.into_iter().next().and_then(Argument::into_value))
//!     })
//!     .unwrap();
//!
//! engine
//!     .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"x":1}}"#, ())
//!     .await
//!     .unwrap();
//! # }
//! ```

pub mod batch;
pub mod binder;
pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod ledger;
pub mod message;
pub mod notification;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod response;
pub mod transport;
pub mod types;

// Re-export main types
pub use binder::{Argument, bind};
pub use config::EngineConfig;
pub use engine::{BatchRequest, InboundPayload, JsonRpcEngine, JsonRpcEngineBuilder};
pub use error::{
    EngineError, HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject,
    RegistrationError, TransportError,
};
pub use id::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use ledger::{CallOutcome, PendingCalls};
pub use message::IncomingMessage;
pub use notification::JsonRpcNotification;
pub use registry::{BindingMode, DispatchRegistry, FunctionHandler, HandlerResult, MethodHandler};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use transport::{ChannelTransport, FnTransport, OutboundPayload, Transport};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Implementation-defined, taken from the server error range
    pub const REQUEST_TIMEOUT: i64 = -32099;
    pub const CANCELLED: i64 = -32098;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
