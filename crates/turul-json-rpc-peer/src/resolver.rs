//! Message Resolver
//!
//! Routes one classified envelope: responses and errors settle the ledger,
//! requests and notifications go through the registry, and anything else
//! becomes an Invalid Request reply.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::binder::bind;
use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::ledger::PendingCalls;
use crate::message::IncomingMessage;
use crate::registry::DispatchRegistry;
use crate::request::RequestParams;
use crate::response::JsonRpcMessage;
use crate::types::RequestId;

/// What resolving one envelope did
#[derive(Debug)]
pub enum Resolution {
    /// A success response was matched against the ledger
    Resolved { id: RequestId, delivered: bool },
    /// An error response was matched against the ledger
    Rejected {
        id: Option<RequestId>,
        delivered: bool,
    },
    /// A reply must be sent to the peer
    Reply(JsonRpcMessage),
    /// Handled, nothing to send (notifications)
    NoReply,
}

impl Resolution {
    pub fn into_reply(self) -> Option<JsonRpcMessage> {
        match self {
            Resolution::Reply(reply) => Some(reply),
            _ => None,
        }
    }
}

/// Borrowing view over the engine state needed to resolve messages
pub struct MessageResolver<'a, C> {
    registry: &'a DispatchRegistry<C>,
    ledger: &'a PendingCalls,
}

impl<'a, C> MessageResolver<'a, C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new(registry: &'a DispatchRegistry<C>, ledger: &'a PendingCalls) -> Self {
        Self { registry, ledger }
    }

    /// Resolve a single (non-batch) JSON value
    pub async fn resolve(&self, value: Value, context: &C) -> Resolution {
        match IncomingMessage::classify(value) {
            IncomingMessage::Error(JsonRpcError { id, error, .. }) => {
                let delivered = match &id {
                    Some(id) => self.ledger.reject_entry(id, error),
                    None => {
                        warn!(code = error.code, message = %error.message, "Received error response without id");
                        false
                    }
                };
                Resolution::Rejected { id, delivered }
            }
            IncomingMessage::Response(response) => {
                let delivered = self.ledger.resolve_entry(&response.id, response.result);
                Resolution::Resolved {
                    id: response.id,
                    delivered,
                }
            }
            IncomingMessage::StrayResponse { reason } => {
                warn!(reason = %reason, "Dropping response that matches no call");
                Resolution::NoReply
            }
            IncomingMessage::Request(request) => {
                match self
                    .invoke(&request.method, Some(request.id), request.params, context)
                    .await
                {
                    Some(reply) => Resolution::Reply(reply),
                    None => Resolution::NoReply,
                }
            }
            IncomingMessage::Notification(notification) => {
                self.invoke(&notification.method, None, notification.params, context)
                    .await;
                Resolution::NoReply
            }
            IncomingMessage::Malformed { id, reason } => {
                debug!(reason = %reason, "Invalid request");
                Resolution::Reply(JsonRpcMessage::error(
                    id,
                    JsonRpcErrorObject::invalid_request(Some(Value::String(reason))),
                ))
            }
        }
    }

    /// Run the handler for `method`. Only calls with an id produce a reply.
    async fn invoke(
        &self,
        method: &str,
        id: Option<RequestId>,
        params: Option<RequestParams>,
        context: &C,
    ) -> Option<JsonRpcMessage> {
        let Some(entry) = self.registry.lookup(method) else {
            debug!(method = %method, notification = id.is_none(), "Method not found");
            return id.map(|id| JsonRpcMessage::error(Some(id), JsonRpcErrorObject::method_not_found(method)));
        };

        let args = match bind(method, &entry.mode, params) {
            Ok(args) => args,
            Err(error) => {
                debug!(method = %method, data = ?error.data, "Parameter binding failed");
                return id.map(|id| JsonRpcMessage::error(Some(id), error));
            }
        };

        debug!(method = %method, args = args.len(), "Dispatching");
        let outcome = AssertUnwindSafe(entry.handler.handle(args, context.clone()))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => Ok(value.unwrap_or(Value::Bool(true))),
            Ok(Err(handler_error)) => Err(handler_error.into_error_object()),
            Err(_) => {
                warn!(method = %method, "Handler panicked");
                Err(JsonRpcErrorObject::internal_error(Some(Value::String(
                    "handler panicked".to_string(),
                ))))
            }
        };

        match id {
            Some(id) => Some(match result {
                Ok(value) => JsonRpcMessage::success(id, value),
                Err(error) => JsonRpcMessage::error(Some(id), error),
            }),
            None => {
                if let Err(error) = result {
                    debug!(method = %method, code = error.code, "Notification handler failed");
                }
                None
            }
        }
    }
}
