//! Text codec for the gateway socket.
//!
//! Frames travel as single-line JSON text messages. Decoding never panics:
//! unknown `type` tags, missing required fields, and malformed JSON all
//! surface as [`WireError`].

use roost_core::GatewayError;

use crate::frame::Frame;

/// Codec failure.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<WireError> for GatewayError {
    fn from(err: WireError) -> Self {
        Self::protocol(err.to_string())
    }
}

/// Serialize a frame to its wire text.
pub fn encode_frame(frame: &Frame) -> Result<String, WireError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parse wire text into a frame.
pub fn decode_frame(text: &str) -> Result<Frame, WireError> {
    Ok(serde_json::from_str(text)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
