//! # roost-rpc
//!
//! The gateway wire protocol. One closed tagged-union [`Frame`] type covers
//! every message that crosses the socket — calls, responses, events,
//! ping/pong, and the auth handshake — so the decoder cannot produce an
//! invalid combination of fields. The codec is pure and stateless.

#![deny(unsafe_code)]

pub mod codec;
pub mod frame;

pub use codec::{WireError, decode_frame, encode_frame};
pub use frame::{ErrorBody, Frame};
