//! Pending Call Ledger
//!
//! Tracks outbound calls awaiting a response. Each entry owns the sending half
//! of a oneshot channel and the timer task that will reject it on timeout.
//!
//! Every path that settles an entry (response, peer error, timeout, shutdown)
//! first removes it from the map under the lock, so whichever path gets there
//! first wins and the others find nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::JsonRpcErrorObject;
use crate::types::RequestId;

/// Settled value of an outbound call
pub type CallOutcome = Result<Value, JsonRpcErrorObject>;

struct PendingEntry {
    method: String,
    generation: u64,
    sender: oneshot::Sender<CallOutcome>,
    timer: JoinHandle<()>,
}

type EntryMap = HashMap<RequestId, PendingEntry>;

/// Outbound calls keyed by correlation id
pub struct PendingCalls {
    entries: Arc<Mutex<EntryMap>>,
    next_generation: AtomicU64,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Create an entry for `id` and arm its timeout.
    ///
    /// Must be called from within a Tokio runtime. A still-pending entry with
    /// the same id is rejected and replaced.
    pub fn register(
        &self,
        id: RequestId,
        method: &str,
        timeout: Duration,
    ) -> oneshot::Receiver<CallOutcome> {
        let (sender, receiver) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock();
        let timer = spawn_timer(Arc::downgrade(&self.entries), id.clone(), generation, timeout);
        let previous = entries.insert(
            id.clone(),
            PendingEntry {
                method: method.to_string(),
                generation,
                sender,
                timer,
            },
        );
        drop(entries);

        if let Some(previous) = previous {
            warn!(id = %id, method = %previous.method, "Replacing pending call with duplicate id");
            previous.timer.abort();
            let _ = previous.sender.send(Err(JsonRpcErrorObject::internal_error(Some(
                Value::String(format!("duplicate request id {}", id)),
            ))));
        }

        debug!(id = %id, method = %method, timeout_ms = timeout.as_millis() as u64, "Registered pending call");
        receiver
    }

    /// Deliver a successful result. Returns whether an entry was waiting.
    pub fn resolve_entry(&self, id: &RequestId, result: Value) -> bool {
        settle(&self.entries, id, None, Ok(result))
    }

    /// Deliver an error. Returns whether an entry was waiting.
    pub fn reject_entry(&self, id: &RequestId, error: JsonRpcErrorObject) -> bool {
        settle(&self.entries, id, None, Err(error))
    }

    /// Reject every pending call with a cancellation error and stop all timers
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(RequestId, PendingEntry)> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            entry.timer.abort();
            debug!(id = %id, method = %entry.method, "Cancelling pending call");
            let _ = entry.sender.send(Err(JsonRpcErrorObject::cancelled(Some(
                Value::String("engine shut down".to_string()),
            ))));
        }
        if count > 0 {
            info!(count, "Cancelled pending calls");
        }
        count
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PendingCalls {
    fn drop(&mut self) {
        for (_, entry) in self.entries.lock().drain() {
            entry.timer.abort();
        }
    }
}

/// Remove the entry for `id` and hand it the outcome.
///
/// `generation` is set only by the timer, which must not settle an entry that
/// replaced the one it was armed for.
fn settle(
    entries: &Mutex<EntryMap>,
    id: &RequestId,
    generation: Option<u64>,
    outcome: CallOutcome,
) -> bool {
    let entry = {
        let mut entries = entries.lock();
        let stale = matches!(
            (entries.get(id), generation),
            (Some(entry), Some(generation)) if entry.generation != generation
        );
        if stale { None } else { entries.remove(id) }
    };

    let Some(entry) = entry else {
        if generation.is_none() {
            warn!(id = %id, "Received response for unknown request id");
        }
        return false;
    };

    if generation.is_none() {
        entry.timer.abort();
    }
    if entry.sender.send(outcome).is_err() {
        debug!(id = %id, method = %entry.method, "Caller stopped waiting before the call settled");
    }
    true
}

fn spawn_timer(
    entries: Weak<Mutex<EntryMap>>,
    id: RequestId,
    generation: u64,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let Some(entries) = entries.upgrade() else {
            return;
        };
        let timeout_ms = timeout.as_millis() as u64;
        let error = JsonRpcErrorObject::request_timeout(Some(json!({ "timeoutMs": timeout_ms })));
        if settle(&entries, &id, Some(generation), Err(error)) {
            warn!(id = %id, timeout_ms, "Call timed out");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JsonRpcErrorCode;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    const TIMEOUT: Duration = Duration::from_millis(5000);

    #[tokio::test]
    async fn test_resolve_delivers_once() {
        let ledger = PendingCalls::new();
        let id = RequestId::from("a");
        let receiver = ledger.register(id.clone(), "echo", TIMEOUT);

        assert!(ledger.resolve_entry(&id, json!(1)));
        assert!(!ledger.resolve_entry(&id, json!(2)));
        assert!(!ledger.reject_entry(&id, JsonRpcErrorObject::internal_error(None)));

        assert_eq!(receiver.await.unwrap(), Ok(json!(1)));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let ledger = PendingCalls::new();
        let id = RequestId::Number(7);
        let receiver = ledger.register(id.clone(), "m", TIMEOUT);

        let error = JsonRpcErrorObject::invalid_params(Some(json!(["z"])));
        assert!(ledger.reject_entry(&id, error.clone()));
        assert_eq!(receiver.await.unwrap(), Err(error));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_unknown_id_is_logged_noop() {
        let ledger = PendingCalls::new();
        assert!(!ledger.resolve_entry(&RequestId::from("ghost"), json!(true)));
        assert!(logs_contain("Received response for unknown request id"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_after_window() {
        let ledger = PendingCalls::new();
        let id = RequestId::from("slow");
        let start = Instant::now();
        let mut receiver = ledger.register(id.clone(), "slow", TIMEOUT);
        // Let the timer task arm its sleep before the clock moves
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(receiver.try_recv().is_err());
        assert!(ledger.contains(&id));

        let outcome = receiver.await.unwrap();
        assert_eq!(start.elapsed(), TIMEOUT);
        let error = outcome.unwrap_err();
        assert!(error.is(JsonRpcErrorCode::RequestTimeout));
        assert!(!ledger.contains(&id));

        // Late response after the timeout is a no-op
        assert!(!ledger.resolve_entry(&id, json!("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_disarms_timer() {
        let ledger = PendingCalls::new();
        let id = RequestId::from("fast");
        let receiver = ledger.register(id.clone(), "fast", TIMEOUT);
        assert!(ledger.resolve_entry(&id, json!("ok")));

        tokio::time::advance(TIMEOUT * 2).await;
        tokio::task::yield_now().await;
        assert_eq!(receiver.await.unwrap(), Ok(json!("ok")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_ignores_replacement() {
        let ledger = PendingCalls::new();
        let id = RequestId::from("reused");
        let first = ledger.register(id.clone(), "m", Duration::from_millis(100));
        let second = ledger.register(id.clone(), "m", Duration::from_millis(1000));

        let replaced = first.await.unwrap().unwrap_err();
        assert!(replaced.is(JsonRpcErrorCode::InternalError));

        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert!(ledger.contains(&id));

        assert!(ledger.resolve_entry(&id, json!(2)));
        assert_eq!(second.await.unwrap(), Ok(json!(2)));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything() {
        let ledger = PendingCalls::new();
        let a = ledger.register(RequestId::Number(1), "a", TIMEOUT);
        let b = ledger.register(RequestId::Number(2), "b", TIMEOUT);

        assert_eq!(ledger.shutdown(), 2);
        assert!(ledger.is_empty());
        for receiver in [a, b] {
            let error = receiver.await.unwrap().unwrap_err();
            assert!(error.is(JsonRpcErrorCode::Cancelled));
        }
    }
}
