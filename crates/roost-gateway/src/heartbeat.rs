//! Heartbeat ping/pong liveness monitoring.
//!
//! Some transports go half-open without ever signaling closure; the monitor
//! exists to notice that. It probes from this side: a `ping` frame goes out
//! every interval tick, and inbound `pong` frames feed the liveness flag.
//! Enough consecutive silent ticks and the connection is declared dead, the
//! same as a socket-level close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use roost_rpc::Frame;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Pong-fed liveness flag shared between the monitor and the frame router.
pub struct Liveness {
    is_alive: AtomicBool,
}

impl Liveness {
    /// Create a flag that starts alive (the handshake just succeeded).
    pub fn new() -> Self {
        Self {
            is_alive: AtomicBool::new(true),
        }
    }

    /// Mark the connection alive (a pong arrived).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for the current heartbeat window.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The remote stopped answering within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally (session ending).
    Cancelled,
}

/// Run heartbeat pings for a live connection.
///
/// At each `interval` tick the liveness flag is checked and a `ping` frame
/// is queued. If the remote has not answered since the last tick the
/// missed-pong counter increments; once `max_missed` consecutive misses are
/// reached the connection is considered dead and
/// [`HeartbeatResult::TimedOut`] is returned.
///
/// `max_missed` is computed as `timeout / interval` (clamped to at least 1).
#[allow(clippy::cast_possible_truncation)]
pub async fn run_heartbeat(
    liveness: Arc<Liveness>,
    pings: mpsc::Sender<Frame>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    let mut missed_pongs: u32 = 0;
    let interval_ms = interval.as_millis().max(1);
    let max_missed = (timeout.as_millis() / interval_ms).max(1) as u32;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if liveness.check_alive() {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    if missed_pongs >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
                if pings.send(Frame::Ping).await.is_err() {
                    // Outbound queue is gone — the session is tearing down.
                    return HeartbeatResult::Cancelled;
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ping_sink() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        mpsc::channel(64)
    }

    #[tokio::test]
    async fn heartbeat_cancelled() {
        let liveness = Arc::new(Liveness::new());
        let (tx, _rx) = ping_sink();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_heartbeat(
            liveness,
            tx,
            Duration::from_secs(100),
            Duration::from_secs(300),
            cancel2,
        ));

        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_times_out_when_remote_is_silent() {
        let liveness = Arc::new(Liveness::new());
        // Pretend the handshake pong already aged out.
        let _ = liveness.check_alive();
        let (tx, _rx) = ping_sink();
        let cancel = CancellationToken::new();

        let result = run_heartbeat(
            liveness,
            tx,
            Duration::from_millis(10),
            Duration::from_millis(10),
            cancel,
        )
        .await;

        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test]
    async fn answered_pings_keep_the_connection_alive() {
        let liveness = Arc::new(Liveness::new());
        let liveness2 = liveness.clone();
        let (tx, _rx) = ping_sink();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_heartbeat(
            liveness2,
            tx,
            Duration::from_millis(50),
            Duration::from_millis(200),
            cancel2,
        ));

        // Keep answering for a few ticks.
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            liveness.mark_alive();
        }

        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn max_missed_computed_from_timeout_and_interval() {
        // timeout=300ms, interval=100ms → three consecutive misses needed.
        let liveness = Arc::new(Liveness::new());
        let _ = liveness.check_alive();
        let (tx, mut rx) = ping_sink();
        let cancel = CancellationToken::new();

        let result = run_heartbeat(
            liveness,
            tx,
            Duration::from_millis(100),
            Duration::from_millis(300),
            cancel,
        )
        .await;

        assert_eq!(result, HeartbeatResult::TimedOut);
        // Two pings went out before the third miss ended the loop.
        assert_eq!(rx.recv().await, Some(Frame::Ping));
        assert_eq!(rx.recv().await, Some(Frame::Ping));
    }

    #[tokio::test]
    async fn closed_ping_channel_ends_the_loop() {
        let liveness = Arc::new(Liveness::new());
        let (tx, rx) = ping_sink();
        drop(rx);
        let cancel = CancellationToken::new();

        let result = run_heartbeat(
            liveness,
            tx,
            Duration::from_millis(10),
            Duration::from_millis(100),
            cancel,
        )
        .await;

        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[test]
    fn liveness_check_resets_flag() {
        let liveness = Liveness::new();
        assert!(liveness.check_alive());
        assert!(!liveness.check_alive());
        liveness.mark_alive();
        assert!(liveness.check_alive());
    }
}
