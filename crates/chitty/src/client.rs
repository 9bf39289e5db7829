//! Client side of the chat protocol.
//!
//! [`ChatClient`] holds one joined session. [`disconnect`] is the one-shot
//! form: it tells the server that some identity is gone without joining.

use std::time::Duration;

use chitty_protocol::{
    validate_content, ChatMessage, ClientFrame, Codec, JsonCodec,
    ProtocolError, ServerFrame, SessionId, MAX_CONTENT_CHARS,
};
use chitty_transport::{ClientWebSocketConnection, Connection};

use crate::ChittyError;

/// How long to wait for the server to answer a `Join` or a `Leave`.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// A joined chat session.
///
/// `send` and `recv` take `&self`, so the client can sit behind an `Arc`
/// with one task reading while another writes.
pub struct ChatClient {
    conn: ClientWebSocketConnection,
    codec: JsonCodec,
    identity: String,
    session_id: SessionId,
    joined_at: u64,
}

impl ChatClient {
    /// Connects to `addr` and joins as `identity`.
    ///
    /// `addr` may be a bare `host:port` or a full `ws://` URL.
    ///
    /// # Errors
    /// - [`ChittyError::Protocol`] if `identity` is empty
    /// - [`ChittyError::Rejected`] if the server refuses the join, e.g.
    ///   with 409 when the name is taken
    /// - [`ChittyError::Timeout`] / [`ChittyError::ClosedEarly`] if no
    ///   `JoinAck` arrives
    pub async fn connect(
        addr: &str,
        identity: impl Into<String>,
    ) -> Result<Self, ChittyError> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ProtocolError::MalformedJoin(
                "identity must not be empty".into(),
            )
            .into());
        }

        let conn = ClientWebSocketConnection::connect(&ws_url(addr)).await?;
        let codec = JsonCodec;
        send_frame(
            &conn,
            &codec,
            &ClientFrame::Join {
                identity: identity.clone(),
            },
        )
        .await?;

        match recv_reply(&conn, &codec, "join ack").await? {
            ServerFrame::JoinAck {
                session_id,
                logical_time,
            } => {
                tracing::info!(
                    %identity,
                    %session_id,
                    logical_time,
                    "joined chat"
                );
                Ok(Self {
                    conn,
                    codec,
                    identity,
                    session_id,
                    joined_at: logical_time,
                })
            }
            ServerFrame::Error { code, message } => {
                Err(ChittyError::Rejected { code, message })
            }
            other => Err(unexpected(&other)),
        }
    }

    /// The identity this client joined as.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The session id assigned at join time.
    ///
    /// The server renumbers on departures, so the live id may since have
    /// moved down.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Logical time of the join.
    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }

    /// Sends a chat line.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidFrame`] for empty content
    /// - [`ProtocolError::ContentTooLong`] past [`MAX_CONTENT_CHARS`];
    ///   nothing is sent in either case
    pub async fn send(&self, content: &str) -> Result<(), ChittyError> {
        if content.is_empty() {
            return Err(ProtocolError::InvalidFrame("content is empty".into()).into());
        }
        validate_content(content, MAX_CONTENT_CHARS)?;

        let msg = ChatMessage::new(self.identity.as_str(), content);
        send_frame(&self.conn, &self.codec, &ClientFrame::Chat(msg)).await
    }

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` once the server has closed the connection.
    pub async fn recv(&self) -> Result<Option<ServerFrame>, ChittyError> {
        recv_frame(&self.conn, &self.codec).await
    }

    /// Leaves the chat and waits for the server's `LeaveAck`.
    ///
    /// Chat frames that arrive before the ack are discarded, so don't call
    /// this while another task is still reading with [`recv`](Self::recv).
    pub async fn leave(&self) -> Result<(), ChittyError> {
        send_frame(
            &self.conn,
            &self.codec,
            &ClientFrame::Leave {
                identity: self.identity.clone(),
            },
        )
        .await?;

        loop {
            match recv_reply(&self.conn, &self.codec, "leave ack").await? {
                ServerFrame::LeaveAck { .. } => break,
                ServerFrame::Error { code, message } => {
                    return Err(ChittyError::Rejected { code, message });
                }
                other => {
                    tracing::debug!(frame = ?other, "skipping frame while leaving");
                }
            }
        }

        tracing::info!(identity = %self.identity, "left chat");
        self.close().await
    }

    /// Closes the connection without saying goodbye. The server still
    /// announces the departure.
    pub async fn close(&self) -> Result<(), ChittyError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Tells the server at `addr` that `identity` has gone, over a fresh
/// connection, and returns the server's acknowledgement (`"success"`).
///
/// Works whether or not `identity` is currently connected. If it is, that
/// session is removed and everyone sees it leave.
pub async fn disconnect(addr: &str, identity: &str) -> Result<String, ChittyError> {
    let conn = ClientWebSocketConnection::connect(&ws_url(addr)).await?;
    let codec = JsonCodec;
    send_frame(
        &conn,
        &codec,
        &ClientFrame::Leave {
            identity: identity.to_string(),
        },
    )
    .await?;

    let reply = recv_reply(&conn, &codec, "leave ack").await;
    let _ = conn.close().await;

    match reply? {
        ServerFrame::LeaveAck { message } => Ok(message),
        ServerFrame::Error { code, message } => {
            Err(ChittyError::Rejected { code, message })
        }
        other => Err(unexpected(&other)),
    }
}

fn ws_url(addr: &str) -> String {
    if addr.starts_with("ws://") || addr.starts_with("wss://") {
        addr.to_string()
    } else {
        format!("ws://{addr}")
    }
}

async fn send_frame(
    conn: &ClientWebSocketConnection,
    codec: &JsonCodec,
    frame: &ClientFrame,
) -> Result<(), ChittyError> {
    let bytes = codec.encode(frame)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn recv_frame(
    conn: &ClientWebSocketConnection,
    codec: &JsonCodec,
) -> Result<Option<ServerFrame>, ChittyError> {
    match conn.recv().await? {
        Some(data) => Ok(Some(codec.decode(&data)?)),
        None => Ok(None),
    }
}

/// Receives one frame the caller is waiting on.
async fn recv_reply(
    conn: &ClientWebSocketConnection,
    codec: &JsonCodec,
    waiting_for: &'static str,
) -> Result<ServerFrame, ChittyError> {
    tokio::time::timeout(REPLY_TIMEOUT, recv_frame(conn, codec))
        .await
        .map_err(|_| ChittyError::Timeout(waiting_for))??
        .ok_or(ChittyError::ClosedEarly(waiting_for))
}

fn unexpected(frame: &ServerFrame) -> ChittyError {
    ProtocolError::InvalidFrame(format!("unexpected reply: {frame:?}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_adds_scheme() {
        assert_eq!(ws_url("127.0.0.1:5400"), "ws://127.0.0.1:5400");
    }

    #[test]
    fn test_ws_url_keeps_existing_scheme() {
        assert_eq!(ws_url("ws://localhost:1"), "ws://localhost:1");
        assert_eq!(ws_url("wss://chat.example"), "wss://chat.example");
    }

    #[test]
    fn test_unexpected_is_protocol_error() {
        let err = unexpected(&ServerFrame::LeaveAck {
            message: "success".into(),
        });
        assert!(matches!(
            err,
            ChittyError::Protocol(ProtocolError::InvalidFrame(_))
        ));
    }
}
