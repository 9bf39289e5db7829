//! Error types for the protocol layer.
//!
//! Each crate in Chitty defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the bytes or in the shape of a
//! frame, not in networking or registry bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a frame).
    ///
    /// Common causes: malformed JSON, an unknown `"type"` tag, or
    /// missing required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The first frame on a connection could not be turned into a join.
    ///
    /// Raised when a client opens with a chat line (implicit join) but
    /// leaves the sender empty, or sends an explicit `Join` without a
    /// name. There is nobody to register.
    #[error("malformed join: {0}")]
    MalformedJoin(String),

    /// Chat content exceeds the allowed length.
    #[error("content is {len} characters, limit is {max}")]
    ContentTooLong {
        /// Length of the rejected content, in characters.
        len: usize,
        /// The limit that was exceeded.
        max: usize,
    },

    /// The frame is well-formed but not valid at this point in the
    /// conversation (e.g. a second `Join` on an active session).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
