//! # JSON-RPC Peer Prelude
//!
//! Convenient re-exports of the types most engine users need.
//!
//! ```rust
//! use turul_json_rpc_peer::prelude::*;
//! ```

// Engine surface
pub use crate::config::EngineConfig;
pub use crate::engine::{BatchRequest, InboundPayload, JsonRpcEngine, JsonRpcEngineBuilder};
pub use crate::id::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use crate::ledger::CallOutcome;
pub use crate::transport::{ChannelTransport, FnTransport, OutboundPayload, Transport};

// Handlers
pub use crate::binder::Argument;
pub use crate::registry::{BindingMode, FunctionHandler, HandlerResult, MethodHandler};

// Core JSON-RPC types
pub use crate::error::{
    EngineError, HandlerError, JsonRpcErrorCode, JsonRpcErrorObject, RegistrationError,
    TransportError,
};
pub use crate::request::RequestParams;
pub use crate::types::RequestId;

// Standard error codes
pub use crate::error_codes::*;
