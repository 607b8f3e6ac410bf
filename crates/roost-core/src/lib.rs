//! # roost-core
//!
//! Foundation crate for the Roost gateway client:
//!
//! - Branded ID newtypes ([`CallId`], [`ConnectionId`], [`SubscriptionId`])
//! - The [`GatewayError`] taxonomy shared by every layer
//! - Exponential backoff with jitter (portable, sync-only)
//! - Tracing subscriber setup

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;

pub use backoff::{BackoffConfig, BackoffState, backoff_delay_with_random};
pub use errors::{GatewayError, Result};
pub use ids::{CallId, ConnectionId, SubscriptionId};
pub use logging::init_subscriber;
