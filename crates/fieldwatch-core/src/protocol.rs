//! Field stream and action protocol
//!
//! Wire format (server → client, WebSocket text frames):
//!
//!   { "type": "coherence_update", "data": { "stability": 0.75, "exploration": 0.25, "ratio": 3.0 }, "timestamp": "..." }
//!   { "type": "system", "data": { "message": "Connected", "status": "ok", "stability": 0.75 } }
//!   { "type": "error", "data": { "message": "calculator unavailable" } }
//!
//! Action (client → server, HTTP POST):
//!   { "message": "hello", "user_id": "field-client", "userResonance": 0.8 }
//!   → { "response": "...", "stability": 0.75, "exploration": 0.25, "ratio": 3.0 }

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stream envelope
// ---------------------------------------------------------------------------

/// Raw frame as it arrives on the wire, before dispatch on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Payload of a `coherence_update` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceUpdate {
    #[serde(default)]
    pub status: Option<String>,
    pub stability: f64,
    #[serde(default)]
    pub exploration: Option<f64>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of a `system` notice (sent once on connect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNotice {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub exploration: Option<f64>,
    #[serde(default)]
    pub ratio: Option<f64>,
}

/// Payload of an `error` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    #[serde(default)]
    pub message: String,
}

/// Every message kind the stream is known to carry.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMessage {
    CoherenceUpdate(CoherenceUpdate),
    System(SystemNotice),
    Error(ErrorNotice),
    /// A `type` this client does not know. Kept so the dispatcher can log it.
    Unknown { kind: String, data: serde_json::Value },
}

impl FieldMessage {
    /// Decode one text frame.
    ///
    /// Malformed JSON or a known kind with a malformed payload is a parse
    /// error; an unknown kind is not.
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| Error::parse(format!("invalid stream frame: {}", e)))?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let Envelope { kind, data, .. } = envelope;
        let decoded = match kind.as_str() {
            "coherence_update" => serde_json::from_value(data).map(Self::CoherenceUpdate),
            "system" => serde_json::from_value(data).map(Self::System),
            "error" => serde_json::from_value(data).map(Self::Error),
            _ => return Ok(Self::Unknown { kind, data }),
        };
        decoded.map_err(|e| Error::parse(format!("bad '{}' payload: {}", kind, e)))
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::CoherenceUpdate(_) => "coherence_update",
            Self::System(_) => "system",
            Self::Error(_) => "error",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Encode as a wire envelope (used by the mock server and tests).
    pub fn encode(&self, timestamp: Option<String>) -> Result<String> {
        let data = match self {
            Self::CoherenceUpdate(u) => serde_json::to_value(u)?,
            Self::System(s) => serde_json::to_value(s)?,
            Self::Error(e) => serde_json::to_value(e)?,
            Self::Unknown { data, .. } => data.clone(),
        };
        let envelope = Envelope {
            kind: self.kind().to_string(),
            data,
            timestamp,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// The stability value carried by this message, if any.
    pub fn stability(&self) -> Option<f64> {
        match self {
            Self::CoherenceUpdate(u) => Some(u.stability),
            Self::System(s) => s.stability,
            Self::Error(_) | Self::Unknown { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Action endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(rename = "userResonance", default, skip_serializing_if = "Option::is_none")]
    pub user_resonance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub exploration: Option<f64>,
    #[serde(default)]
    pub ratio: Option<f64>,
    /// Anything else the server sent, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_coherence_update() {
        let text = r#"{"type":"coherence_update","data":{"status":"ok","stability":0.75,"exploration":0.25,"ratio":3.0},"timestamp":"2025-04-17T14:28:18"}"#;
        match FieldMessage::decode(text).unwrap() {
            FieldMessage::CoherenceUpdate(u) => {
                assert_eq!(u.stability, 0.75);
                assert_eq!(u.ratio, Some(3.0));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn decode_unknown_kind_is_not_an_error() {
        let msg = FieldMessage::decode(r#"{"type":"phase_shift","data":{"to":"flow"}}"#).unwrap();
        assert_eq!(msg.kind(), "phase_shift");
        assert!(matches!(msg, FieldMessage::Unknown { .. }));
    }

    #[test]
    fn decode_bad_payload_for_known_kind() {
        let err = FieldMessage::decode(r#"{"type":"coherence_update","data":{"stability":"high"}}"#).unwrap_err();
        assert!(err.to_string().contains("coherence_update"));
    }

    #[test]
    fn decode_garbage() {
        assert!(FieldMessage::decode("not json").is_err());
    }

    #[test]
    fn encode_then_decode_system() {
        let msg = FieldMessage::System(SystemNotice {
            message: "Connected".into(),
            status: Some("ok".into()),
            stability: Some(0.75),
            exploration: Some(0.25),
            ratio: Some(3.0),
        });
        let text = msg.encode(None).unwrap();
        assert!(text.contains(r#""type":"system""#));
        assert_eq!(FieldMessage::decode(&text).unwrap(), msg);
    }

    #[test]
    fn chat_request_uses_camel_case_resonance() {
        let req = ChatRequest {
            message: "hi".into(),
            user_id: "u".into(),
            user_resonance: Some(0.8),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""userResonance":0.8"#));
    }

    #[test]
    fn chat_reply_keeps_extra_fields() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"response":"ok","stability":0.7,"qctf":0.9}"#).unwrap();
        assert_eq!(reply.stability, Some(0.7));
        assert_eq!(reply.extra["qctf"], 0.9);
    }
}
