//! Connection state machine.
//!
//! Exactly one [`ConnectionState`] value exists at any time; transitions are
//! the only mutator. The cell itself does not enforce the transition graph —
//! the connection loop's structure does — but every change is logged and the
//! previous value returned so the caller can notice redundant sets.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Lifecycle state of the gateway connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No socket and no intent to connect.
    Disconnected,
    /// Dialing the gateway.
    Connecting,
    /// Socket open, waiting for the auth acknowledgment. A socket open is
    /// never treated as connected until this completes.
    Authenticating,
    /// Handshake complete; calls flow.
    Connected,
    /// Waiting out the backoff delay before dialing again.
    Reconnecting,
    /// Terminal until the caller invokes `connect()` again — credential
    /// rejection or reconnect attempts exhausted.
    Error,
}

impl ConnectionState {
    /// The state's wire name, as used in `connection.state` event payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holder for the current connection state.
pub struct StateCell {
    current: Mutex<ConnectionState>,
}

impl StateCell {
    /// Create a cell in `Disconnected`.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Read the current state.
    pub fn get(&self) -> ConnectionState {
        *self.current.lock()
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(&self, next: ConnectionState) -> ConnectionState {
        let mut guard = self.current.lock();
        let prev = *guard;
        *guard = next;
        drop(guard);
        if prev != next {
            info!(from = %prev, to = %next, "connection state changed");
        }
        prev
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
