//! # roost-gateway
//!
//! The client-side realtime protocol engine for the Roost platform: one
//! persistent WebSocket that multiplexes request/response calls and any
//! number of independent event streams, survives reconnection with jittered
//! backoff, and never silently loses or misroutes a call.
//!
//! The engine is an explicit, constructed instance — build a
//! [`GatewayClient`] from a [`GatewayConfig`] and pass it to whatever
//! surfaces need it. There is no global client.
//!
//! ```no_run
//! use roost_gateway::{CallOptions, GatewayClient, GatewayConfig};
//!
//! # async fn demo() -> roost_core::Result<()> {
//! let client = GatewayClient::new(GatewayConfig::default());
//! client.connect()?;
//! let sub = client.subscribe("chat.turn", |payload| {
//!     println!("turn update: {payload}");
//! });
//! let result = client
//!     .call("chat.send", Some(serde_json::json!({"text": "hi"})), CallOptions::default())
//!     .await?;
//! # let _ = (sub, result);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod calls;
pub mod client;
pub mod config;
pub mod events;
pub mod handshake;
pub mod heartbeat;
pub mod state;
pub mod transport;

pub use client::{CallOptions, GatewayClient};
pub use config::GatewayConfig;
pub use events::{CONNECTION_STATE_CHANNEL, EventBus, Subscription};
pub use roost_settings::OfflineCallPolicy;
pub use state::ConnectionState;
