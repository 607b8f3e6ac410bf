//! The gateway error taxonomy.
//!
//! Five kinds, each reaching exactly the caller whose pending call or
//! subscription triggered it. `Auth` is kept distinct from `Connection` so a
//! UI can tell "retry automatically" from "ask the user to fix credentials".

use serde_json::Value;

/// Convenience alias used across the gateway crates.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by the gateway engine.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport down, reset while pending, or connection not ready.
    #[error("connection error: {message}")]
    Connection {
        /// What happened to the transport.
        message: String,
    },

    /// Credential rejected by the remote side. Never retried automatically.
    #[error("auth error: {message}")]
    Auth {
        /// Why the credential was rejected.
        message: String,
    },

    /// No response arrived within the call's time budget.
    #[error("call '{method}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Method of the call that timed out.
        method: String,
        /// The budget that elapsed.
        timeout_ms: u64,
    },

    /// Malformed or unexpected frame.
    #[error("protocol error: {message}")]
    Protocol {
        /// What was wrong with the frame.
        message: String,
    },

    /// Well-formed error response from the far side.
    #[error("remote error [{code}]: {message}")]
    Remote {
        /// Machine-readable error code supplied by the server.
        code: String,
        /// Human-readable message supplied by the server.
        message: String,
        /// Optional structured details.
        details: Option<Value>,
    },
}

impl GatewayError {
    /// Transport-level failure.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Credential rejection.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Call timeout.
    #[must_use]
    pub fn timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Malformed or unexpected frame.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Server-supplied error response.
    #[must_use]
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Whether reconnecting could plausibly resolve this error.
    ///
    /// Credential rejections are not transient: retrying with the same bad
    /// credential cannot succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
