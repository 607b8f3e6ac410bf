//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the platform
//! JSON wire format. Each type implements [`Default`] with production
//! defaults, and `#[serde(default)]` allows partial JSON — missing fields
//! fall back to their defaults during deserialization.

use roost_core::BackoffConfig;
use serde::{Deserialize, Serialize};

/// Root settings for the Roost client.
///
/// Loaded from `~/.roost/settings.json` with defaults applied for missing
/// fields; `ROOST_*` environment variables override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoostSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Gateway connection settings.
    pub gateway: GatewaySettings,
}

impl Default for RoostSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "roost".to_string(),
            gateway: GatewaySettings::default(),
        }
    }
}

/// Gateway endpoint and protocol-engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Gateway WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Bearer token. Absent is valid — anonymous connect is permitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Default per-call timeout in milliseconds.
    pub call_timeout_ms: u64,
    /// Auth handshake timeout in milliseconds (distinct from call timeouts).
    pub auth_timeout_ms: u64,
    /// Heartbeat ping interval in milliseconds while connected.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat timeout in milliseconds (reconnect after this long without
    /// a pong).
    pub heartbeat_timeout_ms: u64,
    /// Reconnect backoff parameters.
    pub reconnect: BackoffConfig,
    /// Cap on consecutive reconnect attempts. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
    /// Whether socket loss triggers automatic reconnection.
    pub auto_reconnect: bool,
    /// What to do with calls issued while not connected.
    pub offline_calls: OfflineCallPolicy,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: "wss://gateway.roost.dev/realtime".to_string(),
            token: None,
            call_timeout_ms: 30_000,
            auth_timeout_ms: 10_000,
            heartbeat_interval_ms: 15_000,
            heartbeat_timeout_ms: 45_000,
            reconnect: BackoffConfig::default(),
            max_reconnect_attempts: None,
            auto_reconnect: true,
            offline_calls: OfflineCallPolicy::FailFast,
        }
    }
}

/// Policy for calls issued while the connection is not in `connected`.
///
/// Either way the caller always learns the call's fate — a call is never
/// silently dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OfflineCallPolicy {
    /// Reject at issue time with a connection-not-ready error.
    FailFast,
    /// Buffer the call and flush it in order once connected. The call's
    /// timeout keeps running while it waits.
    Queue,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_is_wss() {
        let settings = GatewaySettings::default();
        assert!(settings.url.starts_with("wss://"));
    }

    #[test]
    fn default_token_is_anonymous() {
        assert!(GatewaySettings::default().token.is_none());
    }

    #[test]
    fn default_timeouts() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.call_timeout_ms, 30_000);
        assert_eq!(settings.auth_timeout_ms, 10_000);
        assert_eq!(settings.heartbeat_interval_ms, 15_000);
        assert_eq!(settings.heartbeat_timeout_ms, 45_000);
    }

    #[test]
    fn default_reconnect_is_unbounded() {
        let settings = GatewaySettings::default();
        assert!(settings.max_reconnect_attempts.is_none());
        assert!(settings.auto_reconnect);
    }

    #[test]
    fn default_offline_policy_fails_fast() {
        assert_eq!(
            GatewaySettings::default().offline_calls,
            OfflineCallPolicy::FailFast
        );
    }

    #[test]
    fn partial_json_gets_defaults() {
        let json = r#"{"gateway": {"url": "ws://127.0.0.1:9500/realtime"}}"#;
        let settings: RoostSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.gateway.url, "ws://127.0.0.1:9500/realtime");
        assert_eq!(settings.gateway.call_timeout_ms, 30_000);
        assert_eq!(settings.name, "roost");
    }

    #[test]
    fn offline_policy_wire_values() {
        assert_eq!(
            serde_json::to_string(&OfflineCallPolicy::FailFast).unwrap(),
            "\"failFast\""
        );
        assert_eq!(
            serde_json::to_string(&OfflineCallPolicy::Queue).unwrap(),
            "\"queue\""
        );
    }

    #[test]
    fn serde_roundtrip() {
        let mut settings = RoostSettings::default();
        settings.gateway.token = Some("tok_1".into());
        settings.gateway.max_reconnect_attempts = Some(5);
        let json = serde_json::to_string(&settings).unwrap();
        let back: RoostSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gateway.token.as_deref(), Some("tok_1"));
        assert_eq!(back.gateway.max_reconnect_attempts, Some(5));
    }

    #[test]
    fn field_names_are_camel_case() {
        let json = serde_json::to_string(&GatewaySettings::default()).unwrap();
        assert!(json.contains("callTimeoutMs"));
        assert!(json.contains("heartbeatIntervalMs"));
        assert!(json.contains("autoReconnect"));
        assert!(json.contains("offlineCalls"));
        assert!(!json.contains("call_timeout_ms"));
    }

    #[test]
    fn absent_token_is_omitted() {
        let json = serde_json::to_string(&GatewaySettings::default()).unwrap();
        assert!(!json.contains("token"));
        assert!(!json.contains("maxReconnectAttempts"));
    }
}
