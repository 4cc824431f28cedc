//! Batch Aggregator
//!
//! Every element of an inbound array is resolved independently and
//! concurrently; replies are collected in input order and written once.

use futures::future::join_all;
use serde_json::Value;

use crate::error::JsonRpcErrorObject;
use crate::resolver::{MessageResolver, Resolution};
use crate::response::JsonRpcMessage;

/// Aggregated reply to an inbound batch
#[derive(Debug)]
pub enum BatchReply {
    /// Nothing to send (e.g. all notifications)
    Silent,
    /// Exactly one reply, sent as a bare envelope
    Single(JsonRpcMessage),
    /// Several replies, sent as one array
    Many(Vec<JsonRpcMessage>),
}

impl BatchReply {
    pub fn from_replies(mut replies: Vec<JsonRpcMessage>) -> Self {
        match replies.len() {
            0 => BatchReply::Silent,
            1 => BatchReply::Single(replies.remove(0)),
            _ => BatchReply::Many(replies),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BatchReply::Silent => 0,
            BatchReply::Single(_) => 1,
            BatchReply::Many(replies) => replies.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize for the transport; `None` means no write
    pub fn encode(&self) -> Result<Option<String>, serde_json::Error> {
        match self {
            BatchReply::Silent => Ok(None),
            BatchReply::Single(reply) => serde_json::to_string(reply).map(Some),
            BatchReply::Many(replies) => serde_json::to_string(replies).map(Some),
        }
    }
}

/// Resolve every element of a batch and aggregate the replies
pub async fn process_batch<C>(
    resolver: &MessageResolver<'_, C>,
    elements: Vec<Value>,
    max_batch_size: Option<usize>,
    context: &C,
) -> BatchReply
where
    C: Clone + Send + Sync + 'static,
{
    if elements.is_empty() {
        return BatchReply::Single(JsonRpcMessage::error(
            None,
            JsonRpcErrorObject::invalid_request(Some(Value::String("empty batch".to_string()))),
        ));
    }

    if let Some(max) = max_batch_size {
        if elements.len() > max {
            return BatchReply::Single(JsonRpcMessage::error(
                None,
                JsonRpcErrorObject::invalid_request(Some(Value::String(format!(
                    "batch of {} exceeds limit of {}",
                    elements.len(),
                    max
                )))),
            ));
        }
    }

    let resolutions = join_all(
        elements
            .into_iter()
            .map(|element| resolver.resolve(element, context)),
    )
    .await;

    BatchReply::from_replies(
        resolutions
            .into_iter()
            .filter_map(Resolution::into_reply)
            .collect(),
    )
}
