//! Auth handshake.
//!
//! Runs once immediately after a socket reports open: the credential goes
//! out as an `auth` frame (absent credential is a valid anonymous connect)
//! and the server's acknowledgment must arrive within a bounded window —
//! a protocol-level timeout distinct from per-call timeouts. The connection
//! is never treated as connected until this succeeds.

use std::time::Duration;

use roost_core::GatewayError;
use roost_rpc::Frame;
use tracing::debug;

use crate::transport::{WireReceiver, WireSender};

/// Why a handshake did not complete.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeFailure {
    /// The remote rejected the credential. Terminal: retrying with the same
    /// bad credential cannot succeed.
    #[error("credential rejected: {0}")]
    Credential(GatewayError),

    /// Transport-level problem (no ack, socket closed mid-handshake,
    /// malformed ack). Routed to reconnection.
    #[error("handshake failed: {0}")]
    Transient(String),
}

/// Exchange the credential for a connected acknowledgment.
pub async fn run_handshake<S, R>(
    sender: &mut S,
    receiver: &mut R,
    token: Option<&str>,
    timeout: Duration,
) -> Result<(), HandshakeFailure>
where
    S: WireSender + ?Sized,
    R: WireReceiver + ?Sized,
{
    sender
        .send_frame(Frame::auth_credential(token.map(ToOwned::to_owned)))
        .await
        .map_err(|e| HandshakeFailure::Transient(e.to_string()))?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let next = tokio::time::timeout_at(deadline, receiver.next_frame()).await;
        match next {
            Err(_) => {
                return Err(HandshakeFailure::Transient(format!(
                    "no auth acknowledgment within {timeout:?}"
                )));
            }
            Ok(None) => {
                return Err(HandshakeFailure::Transient(
                    "socket closed during handshake".into(),
                ));
            }
            // A malformed frame at this stage *is* the handshake response —
            // unlike steady-state, it fails the attempt.
            Ok(Some(Err(e))) => return Err(HandshakeFailure::Transient(e.to_string())),
            Ok(Some(Ok(Frame::Auth { ok: Some(true), .. }))) => return Ok(()),
            Ok(Some(Ok(Frame::Auth {
                ok: Some(false),
                error,
                ..
            }))) => {
                let err = error.map_or_else(
                    || GatewayError::auth("credential rejected"),
                    |body| GatewayError::auth(format!("[{}] {}", body.code, body.message)),
                );
                return Err(HandshakeFailure::Credential(err));
            }
            Ok(Some(Ok(other))) => {
                debug!(kind = other.kind(), "ignoring frame before auth acknowledgment");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
