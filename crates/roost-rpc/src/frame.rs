//! Wire frame types.
//!
//! Field names are camelCase on the wire (`idempotencyKey`); optional fields
//! are omitted entirely rather than serialized as `null`.

use roost_core::{CallId, GatewayError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message on the gateway socket, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Frame {
    /// Outbound remote call.
    Call {
        /// Correlation identifier, unique among pending calls.
        id: CallId,
        /// Method name (e.g. `chat.send`). Opaque to the engine.
        method: String,
        /// Optional parameters object.
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
        /// Caller-minted deduplication token, transmitted verbatim.
        #[serde(skip_serializing_if = "Option::is_none")]
        idempotency_key: Option<String>,
    },

    /// Inbound reply to a call, correlated by `id`.
    Response {
        /// Echoed call identifier.
        id: CallId,
        /// Result payload (success).
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Error payload (failure).
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },

    /// Server-pushed notification on a named channel.
    Event {
        /// Channel name (e.g. `chat.turn`, `node.output`).
        channel: String,
        /// Event payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// Liveness probe.
    Ping,

    /// Liveness probe answer.
    Pong,

    /// Auth handshake. The client's copy carries only `token`; the server's
    /// acknowledgment carries `ok` (and `error` on rejection).
    Auth {
        /// Bearer credential. Absent is valid (anonymous connect).
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        /// Acknowledgment flag, set by the server.
        #[serde(skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
        /// Rejection detail, set by the server alongside `ok: false`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },
}

/// Structured error carried inside a `response` or `auth` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `NODE_OFFLINE`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Frame {
    /// Build a call frame.
    #[must_use]
    pub fn call(
        id: CallId,
        method: impl Into<String>,
        params: Option<Value>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self::Call {
            id,
            method: method.into(),
            params,
            idempotency_key,
        }
    }

    /// Build the client side of the auth handshake.
    #[must_use]
    pub fn auth_credential(token: Option<String>) -> Self {
        Self::Auth {
            token,
            ok: None,
            error: None,
        }
    }

    /// Build a successful auth acknowledgment (server side; used in tests).
    #[must_use]
    pub fn auth_ack() -> Self {
        Self::Auth {
            token: None,
            ok: Some(true),
            error: None,
        }
    }

    /// Build an auth rejection (server side; used in tests).
    #[must_use]
    pub fn auth_rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            token: None,
            ok: Some(false),
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }

    /// The frame kind as a wire tag, for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call { .. } => "call",
            Self::Response { .. } => "response",
            Self::Event { .. } => "event",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Auth { .. } => "auth",
        }
    }
}

impl From<ErrorBody> for GatewayError {
    fn from(body: ErrorBody) -> Self {
        Self::Remote {
            code: body.code,
            message: body.message,
            details: body.details,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Call frames ─────────────────────────────────────────────────

    #[test]
    fn call_roundtrip_with_params() {
        let frame = Frame::call(
            CallId::from("call_1"),
            "chat.send",
            Some(json!({"text": "hello"})),
            None,
        );
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn call_without_params_omits_field() {
        let frame = Frame::call(CallId::from("call_2"), "system.status", None, None);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("params"));
        assert!(!json.contains("idempotencyKey"));
    }

    #[test]
    fn call_idempotency_key_is_camel_case() {
        let frame = Frame::call(
            CallId::from("call_3"),
            "node.command",
            Some(json!({})),
            Some("idem_abc".into()),
        );
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("idempotencyKey"));
        assert!(!json.contains("idempotency_key"));
    }

    // ── Wire format fixtures ────────────────────────────────────────

    #[test]
    fn wire_format_call() {
        let raw = r#"{"type":"call","id":"c1","method":"files.list","params":{"path":"/"}}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        match frame {
            Frame::Call {
                id, method, params, ..
            } => {
                assert_eq!(id.as_str(), "c1");
                assert_eq!(method, "files.list");
                assert_eq!(params.unwrap()["path"], "/");
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_success_response() {
        let raw = r#"{"type":"response","id":"c1","result":{"files":[]}}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        match frame {
            Frame::Response { id, result, error } => {
                assert_eq!(id.as_str(), "c1");
                assert!(result.is_some());
                assert!(error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_error_response() {
        let raw = r#"{"type":"response","id":"c2","error":{"code":"NODE_OFFLINE","message":"node is offline"}}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        match frame {
            Frame::Response { error, .. } => {
                let body = error.unwrap();
                assert_eq!(body.code, "NODE_OFFLINE");
                assert_eq!(body.message, "node is offline");
                assert!(body.details.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_event() {
        let raw = r#"{"type":"event","channel":"chat.turn","payload":{"state":"delta","text":"hi"}}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        match frame {
            Frame::Event { channel, payload } => {
                assert_eq!(channel, "chat.turn");
                assert_eq!(payload.unwrap()["state"], "delta");
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_ping_pong_are_tag_only() {
        assert_eq!(serde_json::to_string(&Frame::Ping).unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(serde_json::to_string(&Frame::Pong).unwrap(), r#"{"type":"pong"}"#);
        let ping: Frame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, Frame::Ping);
    }

    // ── Auth frames ─────────────────────────────────────────────────

    #[test]
    fn auth_credential_carries_only_token() {
        let frame = Frame::auth_credential(Some("bearer-xyz".into()));
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("bearer-xyz"));
        assert!(!json.contains("ok"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn auth_anonymous_is_bare() {
        let frame = Frame::auth_credential(None);
        assert_eq!(serde_json::to_string(&frame).unwrap(), r#"{"type":"auth"}"#);
    }

    #[test]
    fn auth_ack_roundtrip() {
        let frame = Frame::auth_ack();
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        match back {
            Frame::Auth { ok, error, token } => {
                assert_eq!(ok, Some(true));
                assert!(error.is_none());
                assert!(token.is_none());
            }
            other => panic!("expected auth, got {other:?}"),
        }
    }

    #[test]
    fn auth_rejection_carries_error_body() {
        let frame = Frame::auth_rejected("INVALID_TOKEN", "token expired");
        let json = serde_json::to_string(&frame).unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"]["code"], "INVALID_TOKEN");
    }

    // ── ErrorBody ───────────────────────────────────────────────────

    #[test]
    fn error_body_without_details_omits_field() {
        let body = ErrorBody {
            code: "NOT_FOUND".into(),
            message: "gone".into(),
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn error_body_converts_to_remote_error() {
        let body = ErrorBody {
            code: "QUOTA".into(),
            message: "out of credits".into(),
            details: Some(json!({"remaining": 0})),
        };
        let err: GatewayError = body.into();
        match err {
            GatewayError::Remote {
                code,
                message,
                details,
            } => {
                assert_eq!(code, "QUOTA");
                assert_eq!(message, "out of credits");
                assert_eq!(details.unwrap()["remaining"], 0);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn kind_names_match_wire_tags() {
        assert_eq!(Frame::Ping.kind(), "ping");
        assert_eq!(Frame::Pong.kind(), "pong");
        assert_eq!(Frame::auth_ack().kind(), "auth");
        assert_eq!(
            Frame::call(CallId::new(), "m", None, None).kind(),
            "call"
        );
    }
}
