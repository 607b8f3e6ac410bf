//! Event fan-out to subscribed consumers.
//!
//! Any number of consumers may subscribe to a named channel (a terminal
//! panel and a command palette both watching the same agent-output channel
//! is the normal case). Delivery is in registration order over a snapshot of
//! the subscriber list, so a handler that unsubscribes itself or others
//! mid-dispatch cannot corrupt iteration. Subscriptions belong to the bus,
//! not to any socket — reconnection never touches them.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use roost_core::SubscriptionId;
use serde_json::Value;
use tracing::{debug, warn};

/// Channel carrying engine-synthesized connection-state notifications.
///
/// Payload shape: `{ "state": "...", "generation": n, "timestamp": "..." }`.
pub const CONNECTION_STATE_CHANNEL: &str = "connection.state";

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    id: SubscriptionId,
    handler: Handler,
}

/// Per-channel subscriber registry.
pub struct EventBus {
    channels: Mutex<HashMap<String, Vec<Entry>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handler` on `channel`.
    ///
    /// The returned [`Subscription`] is the only removal path: dropping it
    /// leaves the subscription active (nothing implicit ever unsubscribes).
    pub fn subscribe(
        self: &Arc<Self>,
        channel: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let channel = channel.into();
        let id = SubscriptionId::new();
        let mut guard = self.channels.lock();
        guard.entry(channel.clone()).or_default().push(Entry {
            id: id.clone(),
            handler: Arc::new(handler),
        });
        drop(guard);
        Subscription {
            bus: Arc::downgrade(self),
            channel,
            id,
        }
    }

    /// Deliver `payload` to every handler currently subscribed to `channel`,
    /// in registration order. A panicking handler is caught and logged; its
    /// siblings still run. Returns the number of handlers invoked.
    pub fn dispatch(&self, channel: &str, payload: &Value) -> usize {
        let snapshot: Vec<Handler> = {
            let guard = self.channels.lock();
            match guard.get(channel) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => Vec::new(),
            }
        };
        if snapshot.is_empty() {
            debug!(channel, "event with no subscribers");
            return 0;
        }
        let count = snapshot.len();
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                warn!(channel, "event handler panicked; continuing with remaining handlers");
            }
        }
        count
    }

    /// Number of handlers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, Vec::len)
    }

    fn remove(&self, channel: &str, id: &SubscriptionId) {
        let mut guard = self.channels.lock();
        if let Some(entries) = guard.get_mut(channel) {
            entries.retain(|e| &e.id != id);
            if entries.is_empty() {
                let _ = guard.remove(channel);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one registration on the bus.
///
/// Call [`Subscription::unsubscribe`] to remove the handler. Dropping the
/// handle without calling it keeps the subscription alive for the life of
/// the bus.
#[must_use = "dropping a Subscription does not unsubscribe; keep it or call unsubscribe()"]
pub struct Subscription {
    bus: Weak<EventBus>,
    channel: String,
    id: SubscriptionId,
}

impl Subscription {
    /// The channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the handler from the bus.
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.channel, &self.id);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
