//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RoostSettings::default()`]
//! 2. If `~/.roost/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{OfflineCallPolicy, RoostSettings};

/// Resolve the path to the settings file (`~/.roost/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".roost").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RoostSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RoostSettings> {
    let defaults = serde_json::to_value(RoostSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RoostSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut RoostSettings) {
    if let Some(v) = read_env_string("ROOST_GATEWAY_URL") {
        settings.gateway.url = v;
    }
    if let Some(v) = read_env_string("ROOST_GATEWAY_TOKEN") {
        settings.gateway.token = Some(v);
    }
    if let Some(v) = read_env_u64("ROOST_CALL_TIMEOUT_MS", 100, 3_600_000) {
        settings.gateway.call_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("ROOST_AUTH_TIMEOUT_MS", 100, 600_000) {
        settings.gateway.auth_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("ROOST_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        settings.gateway.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("ROOST_HEARTBEAT_TIMEOUT_MS", 1000, 3_600_000) {
        settings.gateway.heartbeat_timeout_ms = v;
    }
    if let Some(v) = read_env_bool("ROOST_AUTO_RECONNECT") {
        settings.gateway.auto_reconnect = v;
    }
    if let Some(v) = read_env_string("ROOST_OFFLINE_CALLS") {
        if let Ok(policy) = serde_json::from_value::<OfflineCallPolicy>(Value::String(v)) {
            settings.gateway.offline_calls = policy;
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within `[min, max]`.
pub fn parse_u64_in_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u64_in_range(&v, min, max))
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
