//! Gateway client configuration.

use std::time::Duration;

use roost_core::BackoffConfig;
use roost_settings::{GatewaySettings, OfflineCallPolicy};

/// Configuration for one [`GatewayClient`](crate::GatewayClient) instance.
///
/// Built either directly or via [`GatewayConfig::from_settings`].
/// Reconfiguring a live client (different URL or credential) means disposing
/// it and constructing a new one — config is immutable after construction.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Gateway WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Bearer token presented in the auth handshake. `None` connects
    /// anonymously.
    pub token: Option<String>,
    /// Default per-call timeout when the caller does not supply one.
    pub call_timeout: Duration,
    /// Bound on the auth handshake (distinct from per-call timeouts).
    pub auth_timeout: Duration,
    /// Ping interval while connected.
    pub heartbeat_interval: Duration,
    /// How long the remote may stay silent before the connection is
    /// declared dead.
    pub heartbeat_timeout: Duration,
    /// Reconnect backoff parameters.
    pub reconnect: BackoffConfig,
    /// Cap on consecutive reconnect attempts. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Whether socket loss triggers automatic reconnection.
    pub auto_reconnect: bool,
    /// What happens to calls issued while not connected.
    pub offline_calls: OfflineCallPolicy,
}

impl GatewayConfig {
    /// Build a config from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            url: settings.url.clone(),
            token: settings.token.clone(),
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
            auth_timeout: Duration::from_millis(settings.auth_timeout_ms),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
            reconnect: settings.reconnect.clone(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            auto_reconnect: settings.auto_reconnect,
            offline_calls: settings.offline_calls,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}
