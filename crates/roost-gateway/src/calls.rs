//! Pending-call bookkeeping for the dispatcher.
//!
//! The table is private to the engine: entries exist from the moment a call
//! is sent (or queued) until resolution, rejection, or timeout, and each
//! entry leaves the table exactly once. Responses are correlated by id and
//! guarded by the socket generation that carried the call, so a fresh socket
//! can never resolve a call issued against a superseded one.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use roost_core::{CallId, GatewayError};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Terminal outcome of one call.
pub type CallOutcome = Result<Value, GatewayError>;

/// One outstanding call.
pub struct PendingCall {
    /// Method name, kept for timeout errors and log lines.
    pub method: String,
    /// Socket generation the call frame went out on. `None` while the call
    /// sits in the offline queue, not yet bound to any socket.
    pub generation: Option<u64>,
    /// Caller-minted deduplication token, transmitted verbatim.
    pub idempotency_key: Option<String>,
    /// When the call was registered.
    pub created_at: Instant,
    tx: oneshot::Sender<CallOutcome>,
}

impl PendingCall {
    /// Create a pending entry whose outcome will be delivered on `tx`.
    pub fn new(
        method: impl Into<String>,
        generation: Option<u64>,
        idempotency_key: Option<String>,
        tx: oneshot::Sender<CallOutcome>,
    ) -> Self {
        Self {
            method: method.into(),
            generation,
            idempotency_key,
            created_at: Instant::now(),
            tx,
        }
    }

    /// Deliver the outcome. A caller that stopped waiting is fine — the
    /// entry has still been cleaned up.
    pub(crate) fn finish(self, outcome: CallOutcome) {
        if self.tx.send(outcome).is_err() {
            debug!(method = %self.method, "call completed after caller stopped waiting");
        }
    }
}

/// The pending-call table. Owned exclusively by the engine.
pub struct CallTable {
    entries: Mutex<HashMap<CallId, PendingCall>>,
}

impl CallTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of currently-pending calls.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no calls are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Register a pending call. Returns `false` (and drops nothing) if the
    /// id is already live — ids are freshly minted per call, so a collision
    /// is a bug worth shouting about.
    pub fn insert(&self, id: CallId, call: PendingCall) -> bool {
        let mut guard = self.entries.lock();
        if guard.contains_key(&id) {
            error!(%id, "call id collision in pending table");
            return false;
        }
        let _ = guard.insert(id, call);
        true
    }

    /// Bind a queued entry to the socket generation about to carry it.
    /// Returns `false` if the entry is gone (timed out while queued).
    pub fn bind_generation(&self, id: &CallId, generation: u64) -> bool {
        let mut guard = self.entries.lock();
        match guard.get_mut(id) {
            Some(call) => {
                call.generation = Some(generation);
                true
            }
            None => false,
        }
    }

    /// Resolve or reject the call matching `id`, if its entry both exists
    /// and was sent on `frame_generation`. Responses for unknown ids (late
    /// after timeout, or misrouted) and responses from a superseded socket
    /// generation are discarded with a log line.
    ///
    /// Returns `true` if a caller was completed.
    pub fn complete(&self, id: &CallId, frame_generation: u64, outcome: CallOutcome) -> bool {
        let mut guard = self.entries.lock();
        let Some(call) = guard.get(id) else {
            drop(guard);
            debug!(%id, "discarding response for unknown or already-completed call");
            return false;
        };
        if call.generation != Some(frame_generation) {
            let entry_generation = call.generation;
            drop(guard);
            warn!(
                %id,
                ?entry_generation,
                frame_generation,
                "discarding cross-generation response"
            );
            return false;
        }
        let call = guard.remove(id);
        drop(guard);
        if let Some(call) = call {
            call.finish(outcome);
        }
        true
    }

    /// Remove an entry without completing it, handing it to the caller.
    /// Used by the timeout path, which rejects it itself.
    pub fn remove(&self, id: &CallId) -> Option<PendingCall> {
        self.entries.lock().remove(id)
    }

    /// Reject every call sent on `generation` — the disconnect sweep. Runs
    /// exactly once per disconnect event; queued entries not yet bound to a
    /// socket survive. Returns how many callers were rejected.
    pub fn fail_generation(&self, generation: u64, make_error: impl Fn() -> GatewayError) -> usize {
        let removed = self.drain_matching(|call| call.generation == Some(generation));
        let count = removed.len();
        for call in removed {
            call.finish(Err(make_error()));
        }
        count
    }

    /// Reject everything, queued entries included — the disposal sweep.
    pub fn fail_all(&self, make_error: impl Fn() -> GatewayError) -> usize {
        let removed = self.drain_matching(|_| true);
        let count = removed.len();
        for call in removed {
            call.finish(Err(make_error()));
        }
        count
    }

    fn drain_matching(&self, keep: impl Fn(&PendingCall) -> bool) -> Vec<PendingCall> {
        let mut guard = self.entries.lock();
        let ids: Vec<CallId> = guard
            .iter()
            .filter(|(_, call)| keep(call))
            .map(|(id, _)| id.clone())
            .collect();
        let mut removed = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(call) = guard.remove(id) {
                removed.push(call);
            }
        }
        removed
    }
}

impl Default for CallTable {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn pending(
        method: &str,
        generation: Option<u64>,
    ) -> (CallId, PendingCall, oneshot::Receiver<CallOutcome>) {
        let (tx, rx) = oneshot::channel();
        let id = CallId::new();
        (id, PendingCall::new(method, generation, None, tx), rx)
    }

    #[tokio::test]
    async fn complete_resolves_matching_caller() {
        let table = CallTable::new();
        let (id, call, rx) = pending("echo", Some(1));
        assert!(table.insert(id.clone(), call));

        assert!(table.complete(&id, 1, Ok(json!({"x": 1}))));
        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap()["x"], 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn complete_unknown_id_is_discarded() {
        let table = CallTable::new();
        assert!(!table.complete(&CallId::from("nope"), 1, Ok(json!(null))));
    }

    #[tokio::test]
    async fn complete_twice_delivers_once() {
        let table = CallTable::new();
        let (id, call, rx) = pending("echo", Some(1));
        let _ = table.insert(id.clone(), call);

        assert!(table.complete(&id, 1, Ok(json!(1))));
        assert!(!table.complete(&id, 1, Ok(json!(2))));
        assert_eq!(rx.await.unwrap().unwrap(), json!(1));
    }

    #[tokio::test]
    async fn cross_generation_response_is_discarded() {
        let table = CallTable::new();
        let (id, call, rx) = pending("echo", Some(1));
        let _ = table.insert(id.clone(), call);

        // Response arrives tagged with generation 2 — a fresh socket must
        // not resolve a call issued against generation 1.
        assert!(!table.complete(&id, 2, Ok(json!("wrong"))));
        assert_eq!(table.len(), 1);

        // The right generation still can.
        assert!(table.complete(&id, 1, Ok(json!("right"))));
        assert_eq!(rx.await.unwrap().unwrap(), json!("right"));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let table = CallTable::new();
        let (id, call, _rx) = pending("a", Some(1));
        let (_, dup, _rx2) = pending("b", Some(1));
        assert!(table.insert(id.clone(), call));
        assert!(!table.insert(id, dup));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn fail_generation_rejects_only_that_generation() {
        let table = CallTable::new();
        let (id_a, call_a, rx_a) = pending("a", Some(1));
        let (id_b, call_b, rx_b) = pending("b", Some(1));
        let (id_q, call_q, mut rx_q) = pending("queued", None);
        let _ = table.insert(id_a, call_a);
        let _ = table.insert(id_b, call_b);
        let _ = table.insert(id_q, call_q);

        let rejected = table.fail_generation(1, || GatewayError::connection("reset"));
        assert_eq!(rejected, 2);

        assert_matches!(rx_a.await.unwrap(), Err(GatewayError::Connection { .. }));
        assert_matches!(rx_b.await.unwrap(), Err(GatewayError::Connection { .. }));
        // The queued entry is still pending.
        assert_eq!(table.len(), 1);
        assert!(rx_q.try_recv().is_err());
    }

    #[tokio::test]
    async fn fail_generation_runs_clean_on_empty_table() {
        let table = CallTable::new();
        assert_eq!(table.fail_generation(7, || GatewayError::connection("reset")), 0);
    }

    #[tokio::test]
    async fn fail_all_rejects_queued_entries_too() {
        let table = CallTable::new();
        let (id_a, call_a, rx_a) = pending("a", Some(3));
        let (id_q, call_q, rx_q) = pending("queued", None);
        let _ = table.insert(id_a, call_a);
        let _ = table.insert(id_q, call_q);

        let rejected = table.fail_all(|| GatewayError::connection("client disposed"));
        assert_eq!(rejected, 2);
        assert!(table.is_empty());
        assert_matches!(rx_a.await.unwrap(), Err(GatewayError::Connection { .. }));
        assert_matches!(rx_q.await.unwrap(), Err(GatewayError::Connection { .. }));
    }

    #[tokio::test]
    async fn bind_generation_updates_queued_entry() {
        let table = CallTable::new();
        let (id, call, rx) = pending("queued", None);
        let _ = table.insert(id.clone(), call);

        assert!(table.bind_generation(&id, 4));
        assert!(table.complete(&id, 4, Ok(json!("flushed"))));
        assert_eq!(rx.await.unwrap().unwrap(), json!("flushed"));
    }

    #[tokio::test]
    async fn bind_generation_misses_removed_entry() {
        let table = CallTable::new();
        assert!(!table.bind_generation(&CallId::from("gone"), 4));
    }

    #[tokio::test]
    async fn remove_hands_entry_to_timeout_path() {
        let table = CallTable::new();
        let (id, call, rx) = pending("slow", Some(1));
        let _ = table.insert(id.clone(), call);

        let entry = table.remove(&id).unwrap();
        entry.finish(Err(GatewayError::timeout("slow", 100)));
        assert_matches!(
            rx.await.unwrap(),
            Err(GatewayError::Timeout { timeout_ms: 100, .. })
        );

        // A response after timeout finds nothing to resolve.
        assert!(!table.complete(&id, 1, Ok(json!("late"))));
    }

    #[tokio::test]
    async fn finish_with_dropped_receiver_does_not_panic() {
        let table = CallTable::new();
        let (id, call, rx) = pending("abandoned", Some(1));
        let _ = table.insert(id.clone(), call);
        drop(rx);
        // Caller gave up waiting; cleanup still proceeds.
        assert!(table.complete(&id, 1, Ok(json!(null))));
        assert!(table.is_empty());
    }
}
