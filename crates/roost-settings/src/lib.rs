//! # roost-settings
//!
//! Configuration for the Roost gateway client, loaded from three layers
//! (in priority order):
//!
//! 1. **Compiled defaults** — [`RoostSettings::default()`]
//! 2. **User file** — `~/.roost/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `ROOST_*` overrides (highest priority)
//!
//! There is no global settings singleton: callers load settings explicitly
//! and hand them to the gateway client at construction time. Reconfiguring
//! a live client means disposing it and constructing a new one.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{GatewaySettings, OfflineCallPolicy, RoostSettings};
