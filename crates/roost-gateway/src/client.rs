//! The gateway client facade and its connection task.
//!
//! One task owns the socket for the client's whole life: it dials,
//! handshakes, then services a select loop over outbound frames, inbound
//! frames, the heartbeat, and cancellation. Consumers interact only through
//! [`GatewayClient::call`] and [`GatewayClient::subscribe`]; every mutation
//! of the pending-call table and subscriber map happens behind those seams.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use roost_core::{BackoffState, CallId, GatewayError, Result};
use roost_rpc::Frame;
use roost_settings::OfflineCallPolicy;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::calls::{CallTable, PendingCall};
use crate::config::GatewayConfig;
use crate::events::{CONNECTION_STATE_CHANNEL, EventBus, Subscription};
use crate::handshake::{HandshakeFailure, run_handshake};
use crate::heartbeat::{HeartbeatResult, Liveness, run_heartbeat};
use crate::state::{ConnectionState, StateCell};
use crate::transport::{WireReceiver, WireSender, dial};

/// Per-call options.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    /// Overrides the configured default call timeout.
    pub timeout: Option<Duration>,
    /// Caller-minted token letting the remote side deduplicate retries of
    /// the same logical action. The engine transmits it verbatim and never
    /// generates or mutates one.
    pub idempotency_key: Option<String>,
}

/// Live-socket handle: the outbound queue plus the generation it belongs to.
#[derive(Clone)]
struct Link {
    tx: mpsc::Sender<Frame>,
    generation: u64,
}

struct Lifecycle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    config: GatewayConfig,
    state: StateCell,
    calls: CallTable,
    bus: Arc<EventBus>,
    /// Socket generation counter; incremented per successful handshake.
    generation: AtomicU64,
    link: Mutex<Option<Link>>,
    offline_queue: Mutex<Vec<Frame>>,
    lifecycle: Mutex<Lifecycle>,
    /// Cancelled exactly once, at disposal. Parent of every timer the
    /// engine spawns, so none can fire into a disposed client.
    dispose_cancel: CancellationToken,
    disposed: AtomicBool,
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.transition(next);
        if prev != next {
            let payload = json!({
                "state": next,
                "generation": self.generation.load(Ordering::SeqCst),
                "timestamp": chrono::Utc::now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            });
            let _ = self.bus.dispatch(CONNECTION_STATE_CHANNEL, &payload);
        }
    }
}

/// The realtime gateway client.
///
/// Constructed explicitly and passed to whatever surfaces need it; there is
/// no global instance. Tear it down with [`GatewayClient::dispose`];
/// reconfiguration (a different URL or credential) is done by disposing and
/// constructing a new client, never by mutating a live one.
pub struct GatewayClient {
    inner: Arc<Inner>,
}

impl GatewayClient {
    /// Create a client. No socket is opened until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: StateCell::new(),
                calls: CallTable::new(),
                bus: Arc::new(EventBus::new()),
                generation: AtomicU64::new(0),
                link: Mutex::new(None),
                offline_queue: Mutex::new(Vec::new()),
                lifecycle: Mutex::new(Lifecycle {
                    cancel: CancellationToken::new(),
                    task: None,
                }),
                dispose_cancel: CancellationToken::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The client's configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Number of currently-pending calls.
    pub fn pending_calls(&self) -> usize {
        self.inner.calls.len()
    }

    /// Start the connection state machine.
    ///
    /// Returns immediately; progress is observable via
    /// [`CONNECTION_STATE_CHANNEL`] events and [`state`](Self::state).
    /// A no-op when the machine is already running; after an `Error` stop
    /// (credential rejection, attempts exhausted) calling this again
    /// restarts from `Connecting`. Must be called from within a tokio
    /// runtime.
    pub fn connect(&self) -> Result<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(GatewayError::connection("client disposed"));
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if let Some(task) = &lifecycle.task {
            if !task.is_finished() {
                return Ok(());
            }
        }
        let cancel = self.inner.dispose_cancel.child_token();
        lifecycle.cancel = cancel.clone();
        let inner = Arc::clone(&self.inner);
        lifecycle.task = Some(tokio::spawn(run_connection(inner, cancel)));
        Ok(())
    }

    /// Stop the connection machine and close the socket.
    ///
    /// In-flight calls are rejected with a connection error; queued offline
    /// calls stay queued for a later `connect()`. Subscriptions are
    /// untouched. Terminal until `connect()` is called again.
    pub async fn disconnect(&self) {
        let (cancel, task) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            (lifecycle.cancel.clone(), lifecycle.task.take())
        };
        cancel.cancel();
        if let Some(task) = task {
            if task.await.is_err() {
                warn!("connection task panicked during shutdown");
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Tear the client down for good: cancel every timer (backoff,
    /// heartbeat, per-call), reject all pending calls — queued included —
    /// and release the socket. The client refuses further work afterwards.
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.dispose_cancel.cancel();
        let task = self.inner.lifecycle.lock().task.take();
        if let Some(task) = task {
            if task.await.is_err() {
                warn!("connection task panicked during disposal");
            }
        }
        self.inner.offline_queue.lock().clear();
        let rejected = self
            .inner
            .calls
            .fail_all(|| GatewayError::connection("client disposed"));
        if rejected > 0 {
            debug!(rejected, "rejected pending calls at disposal");
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Subscribe to a named event channel.
    ///
    /// The subscription survives reconnection; only
    /// [`Subscription::unsubscribe`] removes it.
    pub fn subscribe(
        &self,
        channel: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(channel, handler)
    }

    /// Issue a remote call and await its outcome.
    ///
    /// The method name is opaque to the engine. While not connected the
    /// call either fails fast or is queued, per the configured
    /// [`OfflineCallPolicy`] — it is never silently dropped. Completion is
    /// exactly-once: by the matching response, by timeout, or by
    /// disconnect/disposal, whichever comes first.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        options: CallOptions,
    ) -> Result<Value> {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return Err(GatewayError::connection("client disposed"));
        }
        if method.is_empty() {
            return Err(GatewayError::protocol("call method must not be empty"));
        }
        let timeout = options.timeout.unwrap_or(inner.config.call_timeout);
        if timeout.is_zero() {
            return Err(GatewayError::protocol("call timeout must be positive"));
        }

        let id = CallId::new();
        let (done_tx, done_rx) = oneshot::channel();
        let link = inner.link.lock().clone();

        match link {
            Some(link) => {
                let frame = Frame::call(id.clone(), method, params, options.idempotency_key.clone());
                let entry =
                    PendingCall::new(method, Some(link.generation), options.idempotency_key, done_tx);
                if !inner.calls.insert(id.clone(), entry) {
                    return Err(GatewayError::protocol("call id collision"));
                }
                if link.tx.send(frame).await.is_err() {
                    // The session collapsed between the link snapshot and
                    // the send. If the disconnect sweep beat us to the
                    // entry, its outcome is already on the channel.
                    if inner.calls.remove(&id).is_some() {
                        return Err(GatewayError::connection("connection lost before send"));
                    }
                }
            }
            None => match inner.config.offline_calls {
                OfflineCallPolicy::FailFast => {
                    return Err(GatewayError::connection("not connected to gateway"));
                }
                OfflineCallPolicy::Queue => {
                    let frame =
                        Frame::call(id.clone(), method, params, options.idempotency_key.clone());
                    let entry = PendingCall::new(method, None, options.idempotency_key, done_tx);
                    if !inner.calls.insert(id.clone(), entry) {
                        return Err(GatewayError::protocol("call id collision"));
                    }
                    inner.offline_queue.lock().push(frame);
                    debug!(%id, method, "queued call while disconnected");
                }
            },
        }

        spawn_timeout_reaper(Arc::clone(inner), id, method.to_owned(), timeout);

        match done_rx.await {
            Ok(outcome) => outcome,
            // Unreachable in practice: every removal path sends an outcome.
            Err(_) => Err(GatewayError::connection("call abandoned without outcome")),
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        // Backstop for callers that skip dispose(): stops the connection
        // task and every per-call timer.
        self.inner.dispose_cancel.cancel();
    }
}

/// Guarantee the pending entry is reaped even if the caller stops waiting:
/// cancellation of a `call()` future leaves the entry to this timer or to
/// the disconnect sweep, never dangling.
fn spawn_timeout_reaper(inner: Arc<Inner>, id: CallId, method: String, timeout: Duration) {
    let cancel = inner.dispose_cancel.clone();
    #[allow(clippy::cast_possible_truncation)]
    let timeout_ms = timeout.as_millis() as u64;
    drop(tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(timeout) => {
                if let Some(entry) = inner.calls.remove(&id) {
                    debug!(%id, %method, timeout_ms, "call timed out");
                    entry.finish(Err(GatewayError::timeout(method, timeout_ms)));
                }
            }
            () = cancel.cancelled() => {}
        }
    }));
}

enum SessionEnd {
    Cancelled,
    Lost(String),
}

async fn run_connection(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut backoff = BackoffState::default();
    loop {
        inner.set_state(ConnectionState::Connecting);
        let dialed = tokio::select! {
            res = dial(&inner.config.url) => res,
            () = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        match dialed {
            Ok((mut sender, mut receiver)) => {
                inner.set_state(ConnectionState::Authenticating);
                let handshake = tokio::select! {
                    res = run_handshake(
                        &mut sender,
                        &mut receiver,
                        inner.config.token.as_deref(),
                        inner.config.auth_timeout,
                    ) => Some(res),
                    () = cancel.cancelled() => None,
                };

                match handshake {
                    None => {
                        sender.close().await;
                        inner.set_state(ConnectionState::Disconnected);
                        return;
                    }
                    Some(Ok(())) => {
                        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                        let (out_tx, out_rx) = mpsc::channel::<Frame>(256);
                        *inner.link.lock() = Some(Link {
                            tx: out_tx.clone(),
                            generation,
                        });
                        backoff.reset();
                        inner.set_state(ConnectionState::Connected);
                        info!(generation, "gateway connected");
                        flush_offline_queue(&inner, generation, out_tx.clone());

                        let end = run_session(
                            &inner, sender, receiver, out_tx, out_rx, generation, &cancel,
                        )
                        .await;

                        // One sweep per disconnect event, never per frame:
                        // drop the link first so no new sends target the
                        // dead socket, then reject the whole generation.
                        *inner.link.lock() = None;
                        let rejected = inner.calls.fail_generation(generation, || {
                            GatewayError::connection("connection reset while pending")
                        });
                        if rejected > 0 {
                            debug!(rejected, generation, "rejected pending calls on disconnect");
                        }

                        match end {
                            SessionEnd::Cancelled => {
                                inner.set_state(ConnectionState::Disconnected);
                                return;
                            }
                            SessionEnd::Lost(reason) => {
                                warn!(%reason, generation, "gateway connection lost");
                            }
                        }
                    }
                    Some(Err(HandshakeFailure::Credential(err))) => {
                        sender.close().await;
                        warn!(error = %err, "credential rejected; not retrying");
                        inner.set_state(ConnectionState::Error);
                        return;
                    }
                    Some(Err(HandshakeFailure::Transient(reason))) => {
                        sender.close().await;
                        debug!(%reason, "handshake failed; will retry");
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "dial failed");
            }
        }

        if !inner.config.auto_reconnect {
            inner.set_state(ConnectionState::Error);
            return;
        }
        if let Some(max) = inner.config.max_reconnect_attempts {
            if backoff.attempt >= max {
                warn!(attempts = backoff.attempt, "reconnect attempts exhausted");
                inner.set_state(ConnectionState::Error);
                return;
            }
        }
        inner.set_state(ConnectionState::Reconnecting);
        let delay = backoff.next_delay_ms(&inner.config.reconnect, rand::random::<f64>());
        debug!(delay_ms = delay, attempt = backoff.attempt, "backing off before reconnect");
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(delay)) => {}
            () = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
        }
    }
}

/// Send calls that accumulated while disconnected, in issue order. Entries
/// that timed out while waiting are skipped — their callers already heard.
/// Runs as its own task so the session loop can drain the outbound queue
/// while the flush feeds it.
fn flush_offline_queue(inner: &Arc<Inner>, generation: u64, out_tx: mpsc::Sender<Frame>) {
    let queued: Vec<Frame> = std::mem::take(&mut *inner.offline_queue.lock());
    if queued.is_empty() {
        return;
    }
    info!(count = queued.len(), "flushing queued calls");
    let inner = Arc::clone(inner);
    drop(tokio::spawn(async move {
        for frame in queued {
            let Frame::Call { ref id, .. } = frame else {
                continue;
            };
            if !inner.calls.bind_generation(id, generation) {
                debug!(%id, "skipping queued call whose entry expired");
                continue;
            }
            if out_tx.send(frame).await.is_err() {
                // Session already collapsing; the disconnect sweep takes over.
                break;
            }
        }
    }));
}

async fn run_session<S: WireSender, R: WireReceiver>(
    inner: &Arc<Inner>,
    mut sender: S,
    mut receiver: R,
    out_tx: mpsc::Sender<Frame>,
    mut out_rx: mpsc::Receiver<Frame>,
    generation: u64,
    cancel: &CancellationToken,
) -> SessionEnd {
    let liveness = Arc::new(Liveness::new());
    let hb = run_heartbeat(
        Arc::clone(&liveness),
        out_tx.clone(),
        inner.config.heartbeat_interval,
        inner.config.heartbeat_timeout,
        cancel.child_token(),
    );
    tokio::pin!(hb);

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                break SessionEnd::Cancelled;
            }
            hb_result = &mut hb => {
                break match hb_result {
                    HeartbeatResult::TimedOut => {
                        SessionEnd::Lost("heartbeat timeout".into())
                    }
                    HeartbeatResult::Cancelled => SessionEnd::Cancelled,
                };
            }
            outbound = out_rx.recv() => {
                // The link sender lives in Inner while the session runs, so
                // recv() cannot return None here.
                if let Some(frame) = outbound {
                    if let Err(e) = sender.send_frame(frame).await {
                        break SessionEnd::Lost(format!("write failed: {e}"));
                    }
                }
            }
            inbound = receiver.next_frame() => {
                match inbound {
                    None => break SessionEnd::Lost("socket closed".into()),
                    Some(Err(e)) if e.is_transient() => {
                        break SessionEnd::Lost(e.to_string());
                    }
                    Some(Err(e)) => {
                        // One malformed frame is logged, not fatal.
                        warn!(error = %e, "ignoring malformed frame");
                    }
                    Some(Ok(frame)) => {
                        route_frame(inner, frame, generation, &liveness, &out_tx);
                    }
                }
            }
        }
    };
    sender.close().await;
    end
}

fn route_frame(
    inner: &Arc<Inner>,
    frame: Frame,
    generation: u64,
    liveness: &Liveness,
    out_tx: &mpsc::Sender<Frame>,
) {
    match frame {
        Frame::Response { id, result, error } => {
            let outcome = match error {
                Some(body) => Err(GatewayError::from(body)),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            let _ = inner.calls.complete(&id, generation, outcome);
        }
        Frame::Event { channel, payload } => {
            let payload = payload.unwrap_or(Value::Null);
            let _ = inner.bus.dispatch(&channel, &payload);
        }
        Frame::Pong => liveness.mark_alive(),
        Frame::Ping => {
            // Server-initiated probe; answer without blocking the router.
            if out_tx.try_send(Frame::Pong).is_err() {
                debug!("outbound queue full; dropping pong reply");
            }
        }
        Frame::Auth { .. } => warn!("unexpected auth frame after handshake"),
        Frame::Call { method, .. } => warn!(%method, "server sent a call frame; ignoring"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests (no network; socket-level behavior lives in tests/integration.rs)
// ─────────────────────────────────────────────────────────────────────────────
