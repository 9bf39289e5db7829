//! Transport abstraction layer for Chitty.
//!
//! The chat relay only needs a bidirectional message stream: something it
//! can `send` frames into and `recv` frames out of, one per client. The
//! [`Transport`] and [`Connection`] traits describe exactly that, so the
//! relay never touches sockets directly.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientWebSocketConnection, PendingWebSocket, WebSocketConnection,
    WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Unique for the lifetime of the process, so it can tell two sessions
/// apart even when both used the same chat identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only waits for the peer to connect. Anything that needs more
/// from the peer (e.g. a protocol upgrade) is deferred to
/// [`Upgrade::upgrade`], so a peer that connects and then goes quiet
/// can't hold up the next `accept`.
pub trait Transport: Send + Sync + 'static {
    /// An accepted connection that still has to be upgraded.
    type Pending: Upgrade;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// Finishes setting up an accepted connection.
///
/// Waits on the peer, so callers run it in the connection's own task and
/// usually under a deadline.
pub trait Upgrade: Send + 'static {
    /// The connection type produced by the upgrade.
    type Connection: Connection;
    /// The error type for a failed upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Completes the handshake and returns the usable connection.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single bidirectional message stream.
///
/// `send` and `recv` take `&self` so one task can sit in `recv` while
/// another pushes outbound frames through `send`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_distinguishes_reused_identities() {
        // Two connections for the same chat name must still compare unequal.
        let first = ConnectionId::new(1);
        let second = ConnectionId::new(2);
        assert_ne!(first, second);
        assert_eq!(first, ConnectionId::new(1));
    }
}
