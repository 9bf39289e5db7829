//! Session types: the server's record of one connected chat client.
//!
//! A session tracks:
//! - WHO the client is (`identity`, chosen by the client)
//! - WHERE it sits in the dense numbering (`session_id`)
//! - WHICH connection it joined on (`connection`)
//! - HOW to reach it (`outbound`, a handle into its writer task)

use chitty_protocol::{ServerFrame, SessionId};
use chitty_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::RegistryError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a connection is in its lifecycle.
///
/// ```text
///   AwaitingJoin ──(Join / first Chat)──→ Active ──(Leave / close)──→ Disconnected
///        │                                                                ↑
///        └───────────────(close / unary Leave / refused)─────────────────┘
/// ```
///
/// `Disconnected` is terminal. A client that wants back in opens a new
/// connection and starts over in `AwaitingJoin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connection is open but nobody has been registered yet.
    AwaitingJoin,

    /// Registered as `identity`; chat lines are relayed.
    Active { identity: String },

    /// The session is over. Nothing more is read from the connection.
    Disconnected,
}

impl SessionState {
    /// Returns the registered identity while `Active`.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Active { identity } => Some(identity),
            _ => None,
        }
    }

    /// Returns `true` once the session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

// ---------------------------------------------------------------------------
// OutboundHandle
// ---------------------------------------------------------------------------

/// The push side of one client's outbound queue.
///
/// Pushing never blocks: frames land in an unbounded channel that the
/// client's writer task drains into the socket. That is what lets the
/// relay fan a message out to everyone without waiting on the slowest
/// reader.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    sender: mpsc::UnboundedSender<ServerFrame>,
}

/// The drain side of an [`OutboundHandle`], owned by the writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerFrame>;

impl OutboundHandle {
    /// Creates a handle and the receiver its writer task drains.
    pub fn channel() -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueues a frame for this client.
    ///
    /// # Errors
    /// Hands the frame back if the writer task has gone away.
    pub fn push(&self, frame: ServerFrame) -> Result<(), ServerFrame> {
        self.sender.send(frame).map_err(|e| e.0)
    }

    /// Returns `true` if the writer task has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// A single connected chat client.
///
/// Created by [`ClientRegistry::register`](crate::ClientRegistry::register)
/// when a join succeeds and dropped on leave. Dropping the session drops
/// its `outbound` handle, which lets the writer task finish.
#[derive(Debug)]
pub struct ClientSession {
    /// The name the client joined with. Unique among connected clients.
    pub identity: String,

    /// Position in the dense `1..=N` numbering. Shifts down when a client
    /// with a lower id leaves.
    pub session_id: SessionId,

    /// The connection this session joined on.
    pub connection: ConnectionId,

    /// Where frames for this client go.
    pub outbound: OutboundHandle,
}

impl ClientSession {
    /// Pushes a frame to this client.
    ///
    /// # Errors
    /// [`RegistryError::UnknownRecipient`] if the client's stream is gone.
    pub fn deliver(&self, frame: ServerFrame) -> Result<(), RegistryError> {
        self.outbound
            .push(frame)
            .map_err(|_| RegistryError::UnknownRecipient(self.identity.clone()))
    }
}
