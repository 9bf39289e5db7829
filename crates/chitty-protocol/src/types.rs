//! Core protocol types for Chitty's wire format.
//!
//! Everything in this module travels "on the wire": it is serialized to
//! bytes by a [`Codec`](crate::Codec), sent over a connection, and
//! deserialized on the other side.
//!
//! The conversation is deliberately tiny:
//!
//! ```text
//! client                          server
//!   │ ── Join { identity } ───────▶ │
//!   │ ◀── JoinAck { session_id } ── │
//!   │ ◀── Chat ("X connected…") ─── │   broadcast to everyone
//!   │ ── Chat { content } ────────▶ │
//!   │ ◀── Chat { logical_timestamp }│   broadcast to everyone
//!   │ ── Leave { identity } ──────▶ │
//!   │ ◀── LeaveAck ──────────────── │
//! ```

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

/// The sender name used for messages the relay itself authors
/// ("X connected at logical time T").
pub const SERVER_IDENTITY: &str = "Server";

/// Maximum chat content length, in characters, on the interactive path.
pub const MAX_CONTENT_CHARS: usize = 128;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A client's position in the relay's dense session numbering.
///
/// Session ids always form the range `1..=N` for N connected clients, so
/// a client's id can shrink while it is connected: when someone with a
/// lower id leaves, everyone above them moves down by one.
///
/// `#[serde(transparent)]` makes `SessionId(3)` serialize as plain `3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// A single chat line.
///
/// `logical_timestamp` belongs to the server: whatever a client puts
/// there is only *observed* (the clock jumps forward to it if it is
/// ahead) and then replaced with the relay's own stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message. `"Server"` for relay announcements.
    pub sender: String,

    /// The text. At most [`MAX_CONTENT_CHARS`] characters.
    pub content: String,

    /// Lamport time assigned by the relay. Clients may omit it.
    #[serde(default)]
    pub logical_timestamp: u64,
}

impl ChatMessage {
    /// Creates an unstamped message from `sender`.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            logical_timestamp: 0,
        }
    }

    /// Creates a relay-authored announcement stamped at `logical_time`.
    pub fn system(content: impl Into<String>, logical_time: u64) -> Self {
        Self {
            sender: SERVER_IDENTITY.to_string(),
            content: content.into(),
            logical_timestamp: logical_time,
        }
    }

    /// Returns `true` if the relay authored this message.
    pub fn is_system(&self) -> bool {
        self.sender == SERVER_IDENTITY
    }

    /// Checks the content against a character limit.
    ///
    /// Counts `char`s, not bytes, so "héllo" is 5 long.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ContentTooLong`] when over `max`.
    pub fn validate_content(&self, max: usize) -> Result<(), ProtocolError> {
        validate_content(&self.content, max)
    }
}

/// Checks `content` against a character limit.
///
/// # Errors
/// Returns [`ProtocolError::ContentTooLong`] when over `max`.
pub fn validate_content(content: &str, max: usize) -> Result<(), ProtocolError> {
    let len = content.chars().count();
    if len > max {
        return Err(ProtocolError::ContentTooLong { len, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Frames a client sends to the relay.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "Join", "identity": "alice" }`. The `Chat` variant wraps a
/// struct, so its fields sit next to the tag:
/// `{ "type": "Chat", "sender": "alice", "content": "hi" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// "I am `identity`, register me." Must be the first frame.
    Join { identity: String },

    /// A chat line to relay to everyone.
    ///
    /// Sent as the very first frame, this doubles as an implicit join
    /// under `sender`.
    Chat(ChatMessage),

    /// "`identity` is leaving." Either the last frame of a session, or
    /// the only frame of a short-lived disconnect-notification connection.
    Leave { identity: String },
}

/// Frames the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// "You're registered." Carries the dense session id and the logical
    /// time at which the join happened.
    JoinAck {
        session_id: SessionId,
        logical_time: u64,
    },

    /// A stamped chat line (from a client or from the relay itself).
    Chat(ChatMessage),

    /// Acknowledges a `Leave`. `message` is `"success"`.
    LeaveAck { message: String },

    /// Something was wrong with the last frame. `code` follows HTTP-style
    /// conventions: 400 bad frame, 403 identity mismatch, 409 name taken,
    /// 413 content too long.
    Error { code: u16, message: String },
}

impl ServerFrame {
    /// Returns the chat message inside a `Chat` frame.
    pub fn as_chat(&self) -> Option<&ChatMessage> {
        match self {
            Self::Chat(msg) => Some(msg),
            _ => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what non-Rust clients code against, so
    //! the tests pin them down explicitly.

    use super::*;

    #[test]
    fn test_session_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&SessionId(3)).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(1).to_string(), "S-1");
    }

    #[test]
    fn test_session_id_orders_numerically() {
        assert!(SessionId(2) < SessionId(10));
    }

    #[test]
    fn test_chat_message_system_is_authored_by_server() {
        let msg = ChatMessage::system("alice connected at logical time 1", 1);
        assert_eq!(msg.sender, "Server");
        assert_eq!(msg.logical_timestamp, 1);
        assert!(msg.is_system());
        assert!(!ChatMessage::new("alice", "hi").is_system());
    }

    #[test]
    fn test_validate_content_accepts_exactly_the_limit() {
        let msg = ChatMessage::new("alice", "a".repeat(MAX_CONTENT_CHARS));
        assert!(msg.validate_content(MAX_CONTENT_CHARS).is_ok());
    }

    #[test]
    fn test_validate_content_rejects_one_over_the_limit() {
        let msg = ChatMessage::new("alice", "a".repeat(MAX_CONTENT_CHARS + 1));
        let err = msg.validate_content(MAX_CONTENT_CHARS).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ContentTooLong { len: 129, max: 128 }
        ));
    }

    #[test]
    fn test_validate_content_counts_chars_not_bytes() {
        // 128 two-byte characters is 256 bytes but still within the limit.
        let content = "é".repeat(MAX_CONTENT_CHARS);
        assert_eq!(content.len(), 256);
        assert!(validate_content(&content, MAX_CONTENT_CHARS).is_ok());
    }

    #[test]
    fn test_client_chat_frame_is_flat_json() {
        let frame = ClientFrame::Chat(ChatMessage::new("alice", "hi"));
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["type"], "Chat");
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["logical_timestamp"], 0);
    }

    #[test]
    fn test_client_chat_frame_timestamp_defaults_when_missing() {
        let json = r#"{"type":"Chat","sender":"bob","content":"yo"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        match frame {
            ClientFrame::Chat(msg) => assert_eq!(msg.logical_timestamp, 0),
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn test_leave_frame_json_format() {
        let frame = ClientFrame::Leave {
            identity: "alice".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "Leave");
        assert_eq!(json["identity"], "alice");
    }

    #[test]
    fn test_server_error_frame_json_format() {
        let frame = ServerFrame::Error {
            code: 409,
            message: "identity alice is already connected".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 409);
    }

    #[test]
    fn test_server_frame_as_chat() {
        let chat = ServerFrame::Chat(ChatMessage::new("a", "b"));
        assert_eq!(chat.as_chat().map(|m| m.content.as_str()), Some("b"));

        let ack = ServerFrame::LeaveAck {
            message: "success".into(),
        };
        assert!(ack.as_chat().is_none());
    }

    #[test]
    fn test_decode_unknown_frame_type_returns_error() {
        let unknown = r#"{"type": "Whisper", "to": "bob"}"#;
        let result: Result<ClientFrame, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
