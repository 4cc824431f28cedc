//! The JSON-RPC engine: one instance per connection, usable as caller and
//! callee at the same time.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::batch::process_batch;
use crate::binder::Argument;
use crate::config::EngineConfig;
use crate::error::{EngineError, JsonRpcErrorObject, RegistrationError};
use crate::id::{IdGenerator, UuidIdGenerator};
use crate::ledger::{CallOutcome, PendingCalls};
use crate::notification::JsonRpcNotification;
use crate::registry::{BindingMode, DispatchRegistry, FunctionHandler, HandlerResult, MethodHandler};
use crate::request::{JsonRpcRequest, RequestParams};
use crate::resolver::MessageResolver;
use crate::response::JsonRpcMessage;
use crate::transport::Transport;

/// Raw inbound data accepted by [`JsonRpcEngine::handle_message`]
#[derive(Debug, Clone)]
pub enum InboundPayload {
    Text(String),
    Bytes(Vec<u8>),
    /// Already decoded by the transport
    Value(Value),
}

impl InboundPayload {
    fn decode(self) -> Result<Value, serde_json::Error> {
        match self {
            InboundPayload::Text(text) => serde_json::from_str(&text),
            InboundPayload::Bytes(bytes) => serde_json::from_slice(&bytes),
            InboundPayload::Value(value) => Ok(value),
        }
    }
}

impl From<String> for InboundPayload {
    fn from(text: String) -> Self {
        InboundPayload::Text(text)
    }
}

impl From<&str> for InboundPayload {
    fn from(text: &str) -> Self {
        InboundPayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for InboundPayload {
    fn from(bytes: Vec<u8>) -> Self {
        InboundPayload::Bytes(bytes)
    }
}

impl From<&[u8]> for InboundPayload {
    fn from(bytes: &[u8]) -> Self {
        InboundPayload::Bytes(bytes.to_vec())
    }
}

impl From<Value> for InboundPayload {
    fn from(value: Value) -> Self {
        InboundPayload::Value(value)
    }
}

/// One element of an outbound batch
#[derive(Debug, Clone)]
pub enum BatchRequest {
    Call {
        method: String,
        params: Option<RequestParams>,
    },
    Notify {
        method: String,
        params: Option<RequestParams>,
    },
}

impl BatchRequest {
    pub fn call(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        BatchRequest::Call {
            method: method.into(),
            params,
        }
    }

    pub fn notify(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        BatchRequest::Notify {
            method: method.into(),
            params,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutboundEnvelope {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Builder for [`JsonRpcEngine`]
pub struct JsonRpcEngineBuilder<C> {
    transport: Arc<dyn Transport<C>>,
    config: EngineConfig,
    id_generator: Arc<dyn IdGenerator>,
}

impl<C> JsonRpcEngineBuilder<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport<C> + 'static,
    {
        Self {
            transport: Arc::new(transport),
            config: EngineConfig::default(),
            id_generator: Arc::new(UuidIdGenerator),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.config.max_batch_size = Some(max);
        self
    }

    pub fn with_id_generator<G>(mut self, generator: G) -> Self
    where
        G: IdGenerator + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    pub fn build(self) -> JsonRpcEngine<C> {
        JsonRpcEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                registry: DispatchRegistry::new(),
                ledger: PendingCalls::new(),
                transport: self.transport,
                id_generator: self.id_generator,
                shut_down: AtomicBool::new(false),
            }),
        }
    }
}

struct EngineInner<C> {
    config: EngineConfig,
    registry: DispatchRegistry<C>,
    ledger: PendingCalls,
    transport: Arc<dyn Transport<C>>,
    id_generator: Arc<dyn IdGenerator>,
    shut_down: AtomicBool,
}

/// Bidirectional JSON-RPC 2.0 engine
///
/// `C` is opaque routing context: it is passed through to the transport on
/// every send and to handlers on every inbound call. Cloning the engine is
/// cheap and yields a handle to the same state.
pub struct JsonRpcEngine<C = ()> {
    inner: Arc<EngineInner<C>>,
}

impl<C> Clone for JsonRpcEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> JsonRpcEngine<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn builder<T>(transport: T) -> JsonRpcEngineBuilder<C>
    where
        T: Transport<C> + 'static,
    {
        JsonRpcEngineBuilder::new(transport)
    }

    /// Engine with default configuration
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport<C> + 'static,
    {
        Self::builder(transport).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register a handler for `method`, replacing any previous one
    pub fn register<H>(
        &self,
        method: impl Into<String>,
        mode: BindingMode,
        handler: H,
    ) -> Result<(), RegistrationError>
    where
        H: MethodHandler<C> + 'static,
    {
        self.inner.registry.register(method, mode, Arc::new(handler))
    }

    /// Register a closure as the handler for `method`
    pub fn register_fn<F, Fut>(
        &self,
        method: impl Into<String>,
        mode: BindingMode,
        handler_fn: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Vec<Argument>, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(method, mode, FunctionHandler::new(handler_fn))
    }

    pub fn deregister(&self, method: &str) -> bool {
        self.inner.registry.deregister(method)
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.inner.registry.registered_methods()
    }

    /// Number of outbound calls still awaiting a response
    pub fn pending_calls(&self) -> usize {
        self.inner.ledger.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Call a remote method and wait for its result, using the configured timeout
    pub async fn call(
        &self,
        method: &str,
        params: Option<RequestParams>,
        context: C,
    ) -> CallOutcome {
        let timeout = self.inner.config.request_timeout;
        self.call_with_timeout(method, params, timeout, context)
            .await
    }

    /// Call a remote method with an explicit timeout
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<RequestParams>,
        timeout: Duration,
        context: C,
    ) -> CallOutcome {
        if self.is_shut_down() {
            return Err(shut_down_error());
        }

        let id = self.inner.id_generator.next_id();
        let request = JsonRpcRequest::new(id.clone(), method.to_string(), params);
        let payload = serde_json::to_string(&request)
            .map_err(|e| JsonRpcErrorObject::internal_error(Some(Value::String(e.to_string()))))?;

        // Registered before sending: the response may arrive before send returns
        let receiver = self.inner.ledger.register(id.clone(), method, timeout);

        if self.is_shut_down() {
            self.inner.ledger.reject_entry(&id, shut_down_error());
        } else {
            debug!(id = %id, method = %method, "Sending call");
            if let Err(e) = self.inner.transport.send(payload, &context).await {
                warn!(id = %id, method = %method, error = %e, "Transport failed to send call");
                self.inner.ledger.reject_entry(
                    &id,
                    JsonRpcErrorObject::internal_error(Some(Value::String(e.to_string()))),
                );
            }
        }

        receiver.await.unwrap_or_else(|_| Err(shut_down_error()))
    }

    /// Send a notification. No result is reported; send failures are logged.
    pub async fn notify(&self, method: &str, params: Option<RequestParams>, context: C) {
        if self.is_shut_down() {
            debug!(method = %method, "Dropping notification after shutdown");
            return;
        }

        let notification = JsonRpcNotification::new(method.to_string(), params);
        let payload = match serde_json::to_string(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(method = %method, error = %e, "Failed to serialize notification");
                return;
            }
        };

        debug!(method = %method, "Sending notification");
        if let Err(e) = self.inner.transport.send(payload, &context).await {
            warn!(method = %method, error = %e, "Transport failed to send notification");
        }
    }

    /// Send several calls and notifications in one write.
    ///
    /// Returns one outcome per `Call` element, in input order. A failed call
    /// shows up as its error value; the batch itself never fails.
    pub async fn batch(&self, requests: Vec<BatchRequest>, context: C) -> Vec<CallOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }
        if self.is_shut_down() {
            return requests
                .iter()
                .filter(|r| matches!(r, BatchRequest::Call { .. }))
                .map(|_| Err(shut_down_error()))
                .collect();
        }

        let timeout = self.inner.config.request_timeout;
        let mut envelopes = Vec::with_capacity(requests.len());
        let mut pending = Vec::new();

        for request in requests {
            match request {
                BatchRequest::Call { method, params } => {
                    let id = self.inner.id_generator.next_id();
                    let receiver = self.inner.ledger.register(id.clone(), &method, timeout);
                    envelopes.push(OutboundEnvelope::Request(JsonRpcRequest::new(
                        id.clone(),
                        method,
                        params,
                    )));
                    pending.push((id, receiver));
                }
                BatchRequest::Notify { method, params } => {
                    envelopes.push(OutboundEnvelope::Notification(JsonRpcNotification::new(
                        method, params,
                    )));
                }
            }
        }

        if self.is_shut_down() {
            // Entries registered after shutdown drained the ledger
            for (id, _) in &pending {
                self.inner.ledger.reject_entry(id, shut_down_error());
            }
        } else if let Err(reason) = self.send_batch(&envelopes, pending.len(), &context).await {
            warn!(error = %reason, "Failed to send batch");
            for (id, _) in &pending {
                self.inner.ledger.reject_entry(
                    id,
                    JsonRpcErrorObject::internal_error(Some(Value::String(reason.clone()))),
                );
            }
        }

        join_all(pending.into_iter().map(|(_, receiver)| async move {
            receiver.await.unwrap_or_else(|_| Err(shut_down_error()))
        }))
        .await
    }

    /// Inbound entry point: decode, resolve and reply.
    ///
    /// Malformed JSON is answered with a Parse error (id null) and reported
    /// back as [`EngineError::Parse`]. Every other protocol problem becomes an
    /// error reply and this returns `Ok`.
    ///
    /// Resolving a request waits for its handler, so transports should run
    /// each inbound message on its own task. Awaiting messages one after
    /// another stalls any handler that calls back to the peer, since the
    /// peer's reply queues behind the handler itself.
    pub async fn handle_message(
        &self,
        raw: impl Into<InboundPayload>,
        context: C,
    ) -> Result<(), EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }

        let payload: InboundPayload = raw.into();
        let value = match payload.decode() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound message");
                let reply = JsonRpcMessage::error(
                    None,
                    JsonRpcErrorObject::parse_error(Some(Value::String(e.to_string()))),
                );
                if let Err(send_error) = self.send_reply(&reply, &context).await {
                    warn!(error = %send_error, "Failed to send parse error reply");
                }
                return Err(EngineError::Parse(e));
            }
        };

        let resolver = MessageResolver::new(&self.inner.registry, &self.inner.ledger);
        let payload = match value {
            Value::Array(elements) => {
                let reply = process_batch(
                    &resolver,
                    elements,
                    self.inner.config.max_batch_size,
                    &context,
                )
                .await;
                reply.encode().map_err(EngineError::Serialize)?
            }
            value => resolver
                .resolve(value, &context)
                .await
                .into_reply()
                .map(|reply| serde_json::to_string(&reply))
                .transpose()
                .map_err(EngineError::Serialize)?,
        };

        if let Some(payload) = payload {
            self.inner.transport.send(payload, &context).await?;
        }
        Ok(())
    }

    /// Stop the engine: reject every pending call with a cancellation error,
    /// drop all registered methods, and refuse further traffic.
    ///
    /// Returns the number of calls that were cancelled.
    pub fn shutdown(&self) -> usize {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.inner.registry.clear();
        let cancelled = self.inner.ledger.shutdown();
        info!(cancelled, "JSON-RPC engine shut down");
        cancelled
    }

    async fn send_batch(
        &self,
        envelopes: &[OutboundEnvelope],
        calls: usize,
        context: &C,
    ) -> Result<(), String> {
        let payload = serde_json::to_string(envelopes).map_err(|e| e.to_string())?;
        debug!(elements = envelopes.len(), calls, "Sending batch");
        self.inner
            .transport
            .send(payload, context)
            .await
            .map_err(|e| e.to_string())
    }

    async fn send_reply(&self, reply: &JsonRpcMessage, context: &C) -> Result<(), EngineError> {
        let payload = serde_json::to_string(reply).map_err(EngineError::Serialize)?;
        self.inner.transport.send(payload, context).await?;
        Ok(())
    }
}

fn shut_down_error() -> JsonRpcErrorObject {
    JsonRpcErrorObject::cancelled(Some(Value::String("engine shut down".to_string())))
}
