//! Transport sink abstraction
//!
//! The engine never touches sockets; it hands each serialized payload, together
//! with the caller's routing context, to a [`Transport`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Delivers serialized envelopes to the peer
#[async_trait]
pub trait Transport<C>: Send + Sync {
    /// Send one payload. `context` is whatever routing data the caller supplied.
    async fn send(&self, payload: String, context: &C) -> Result<(), TransportError>;
}

/// A payload queued by [`ChannelTransport`]
#[derive(Debug, Clone)]
pub struct OutboundPayload<C> {
    pub payload: String,
    pub context: C,
}

/// Forwards payloads into an unbounded Tokio channel.
///
/// Useful for wiring two engines together in-process, or for a writer task
/// that owns the real socket.
pub struct ChannelTransport<C> {
    sender: mpsc::UnboundedSender<OutboundPayload<C>>,
}

impl<C> ChannelTransport<C> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundPayload<C>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl<C> Transport<C> for ChannelTransport<C>
where
    C: Clone + Send + Sync + 'static,
{
    async fn send(&self, payload: String, context: &C) -> Result<(), TransportError> {
        self.sender
            .send(OutboundPayload {
                payload,
                context: context.clone(),
            })
            .map_err(|_| TransportError::Closed)
    }
}

/// Adapts a synchronous closure into a transport
pub struct FnTransport<F> {
    send_fn: F,
}

impl<F> FnTransport<F> {
    pub fn new(send_fn: F) -> Self {
        Self { send_fn }
    }
}

#[async_trait]
impl<C, F> Transport<C> for FnTransport<F>
where
    C: Sync + 'static,
    F: Fn(&str, &C) -> Result<(), TransportError> + Send + Sync,
{
    async fn send(&self, payload: String, context: &C) -> Result<(), TransportError> {
        (self.send_fn)(&payload, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_channel_transport_forwards_context() {
        let (transport, mut receiver) = ChannelTransport::new();
        transport
            .send("{}".to_string(), &"client-1".to_string())
            .await
            .unwrap();

        let outbound = receiver.recv().await.unwrap();
        assert_eq!(outbound.payload, "{}");
        assert_eq!(outbound.context, "client-1");
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (transport, receiver) = ChannelTransport::<()>::new();
        drop(receiver);
        let result = transport.send("{}".to_string(), &()).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_fn_transport() {
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let transport = FnTransport::new(move |payload: &str, _ctx: &()| {
            counter.fetch_add(payload.len(), Ordering::SeqCst);
            Ok(())
        });
        transport.send("abc".to_string(), &()).await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 3);
    }
}
