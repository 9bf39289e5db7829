//! Relay actor: the one task that owns the registry and the clock.
//!
//! Every join, chat line and leave from every connection is a command on
//! a single mpsc channel. The actor handles them one at a time, so the
//! Lamport counter and the dense session numbering are never touched
//! concurrently, and every client sees broadcasts in the same order.
//! Callers talk to it through a cheap-to-clone [`RelayHandle`].

use chitty_clock::LamportClock;
use chitty_protocol::{ChatMessage, ServerFrame, SessionId};
use chitty_registry::{ClientRegistry, OutboundHandle};
use chitty_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::broadcast::deliver;
use crate::{RelayConfig, RelayError};

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    /// The session id the client was given.
    pub session_id: SessionId,
    /// Logical time of the join (also stamped on the "connected" notice).
    pub logical_time: u64,
}

/// A snapshot of relay state, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    /// Current value of the Lamport counter.
    pub logical_time: u64,
    /// `(session_id, identity)` for every connected client, by id.
    pub roster: Vec<(SessionId, String)>,
    /// Connection slots (clients + 1 for the server).
    pub slot_count: usize,
}

/// Commands sent to the relay actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel.
enum RelayCommand {
    /// Register a client and announce it.
    Join {
        identity: String,
        connection: ConnectionId,
        outbound: OutboundHandle,
        reply: oneshot::Sender<Result<Joined, RelayError>>,
    },

    /// Stamp a chat line and fan it out.
    Chat {
        identity: String,
        msg: ChatMessage,
        reply: oneshot::Sender<Result<u64, RelayError>>,
    },

    /// Remove a client and announce it. `connection` scopes the removal
    /// to one stream when set.
    Leave {
        identity: String,
        connection: Option<ConnectionId>,
        reply: oneshot::Sender<Option<u64>>,
    },

    /// Report current state.
    Snapshot { reply: oneshot::Sender<RelayInfo> },
}

/// Handle to the running relay actor.
///
/// Cloning is cheap (it is an `mpsc::Sender`). The actor stops once every
/// handle has been dropped.
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Registers `identity` and broadcasts "`identity` connected at
    /// logical time T" to everyone, the joiner included.
    ///
    /// Before the broadcast, a `JoinAck` is pushed to `outbound`, so the
    /// joiner always sees its ack first.
    ///
    /// # Errors
    /// [`RelayError::Registry`] for a duplicate or empty identity. The
    /// clock does not move in that case.
    pub async fn join(
        &self,
        identity: impl Into<String>,
        connection: ConnectionId,
        outbound: OutboundHandle,
    ) -> Result<Joined, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Join {
            identity: identity.into(),
            connection,
            outbound,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Unavailable)?
    }

    /// Stamps `msg` with the next logical time and relays it to every
    /// connected client, `identity` included. Returns the stamp.
    ///
    /// `msg.sender` is replaced with `identity`, and `msg.logical_timestamp`
    /// is observed before being overwritten, so the stamp is strictly
    /// greater than both the previous counter and the incoming value.
    ///
    /// # Errors
    /// - [`RelayError::NotJoined`] if `identity` isn't registered
    /// - [`RelayError::Protocol`] if the content is too long
    pub async fn chat(
        &self,
        identity: impl Into<String>,
        msg: ChatMessage,
    ) -> Result<u64, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Chat {
            identity: identity.into(),
            msg,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Unavailable)?
    }

    /// Unregisters `identity` and broadcasts "`identity` left at logical
    /// time T" to everyone still connected.
    ///
    /// Returns the logical time of the departure, or `None` if nobody by
    /// that name was connected, in which case nothing changes: no tick,
    /// no renumbering, no broadcast.
    pub async fn leave(
        &self,
        identity: impl Into<String>,
    ) -> Result<Option<u64>, RelayError> {
        self.leave_inner(identity.into(), None).await
    }

    /// Like [`leave`](Self::leave), but only if `identity` is registered
    /// on `connection`. Used when a stream closes without saying goodbye.
    pub async fn leave_connection(
        &self,
        identity: impl Into<String>,
        connection: ConnectionId,
    ) -> Result<Option<u64>, RelayError> {
        self.leave_inner(identity.into(), Some(connection)).await
    }

    /// Returns a snapshot of the clock and the roster.
    pub async fn snapshot(&self) -> Result<RelayInfo, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RelayError::Unavailable)
    }

    async fn leave_inner(
        &self,
        identity: String,
        connection: Option<ConnectionId>,
    ) -> Result<Option<u64>, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Leave {
            identity,
            connection,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Unavailable)
    }

    async fn send(&self, cmd: RelayCommand) -> Result<(), RelayError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RelayError::Unavailable)
    }
}

/// The actor state. Runs inside its own Tokio task.
struct RelayActor {
    registry: ClientRegistry,
    clock: LamportClock,
    config: RelayConfig,
    receiver: mpsc::Receiver<RelayCommand>,
}

impl RelayActor {
    async fn run(mut self) {
        tracing::info!("relay actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RelayCommand::Join {
                    identity,
                    connection,
                    outbound,
                    reply,
                } => {
                    let result = self.handle_join(&identity, connection, outbound);
                    let _ = reply.send(result);
                }
                RelayCommand::Chat {
                    identity,
                    msg,
                    reply,
                } => {
                    let result = self.handle_chat(&identity, msg);
                    let _ = reply.send(result);
                }
                RelayCommand::Leave {
                    identity,
                    connection,
                    reply,
                } => {
                    let result = self.handle_leave(&identity, connection);
                    let _ = reply.send(result);
                }
                RelayCommand::Snapshot { reply } => {
                    let _ = reply.send(self.info());
                }
            }
        }

        tracing::info!(
            logical_time = self.clock.now(),
            "relay actor stopped"
        );
    }

    fn handle_join(
        &mut self,
        identity: &str,
        connection: ConnectionId,
        outbound: OutboundHandle,
    ) -> Result<Joined, RelayError> {
        let session_id =
            self.registry
                .register(identity, connection, outbound.clone())?;
        let logical_time = self.clock.tick();

        // The ack goes straight to the joiner's queue, ahead of the
        // broadcast below.
        if outbound
            .push(ServerFrame::JoinAck {
                session_id,
                logical_time,
            })
            .is_err()
        {
            tracing::debug!(
                %identity,
                %session_id,
                "joiner's writer already gone, ack dropped"
            );
        }

        tracing::info!(
            %identity,
            %session_id,
            logical_time,
            "participant connected"
        );
        self.announce(
            format!("{identity} connected at logical time {logical_time}"),
            logical_time,
        );

        Ok(Joined {
            session_id,
            logical_time,
        })
    }

    fn handle_chat(
        &mut self,
        identity: &str,
        mut msg: ChatMessage,
    ) -> Result<u64, RelayError> {
        if self.registry.get(identity).is_none() {
            return Err(RelayError::NotJoined(identity.to_string()));
        }
        msg.validate_content(self.config.max_content_chars)?;

        let logical_time = self.clock.receive(msg.logical_timestamp);
        msg.sender = identity.to_string();
        msg.logical_timestamp = logical_time;

        tracing::info!(
            sender = %msg.sender,
            content = %msg.content,
            logical_time,
            "relaying message"
        );
        deliver(&self.registry, &ServerFrame::Chat(msg));
        Ok(logical_time)
    }

    fn handle_leave(
        &mut self,
        identity: &str,
        connection: Option<ConnectionId>,
    ) -> Option<u64> {
        let removed = match connection {
            Some(conn) => self.registry.unregister_connection(identity, conn),
            None => self.registry.unregister(identity),
        };
        // Nobody left, so time doesn't move.
        removed?;

        let logical_time = self.clock.tick();
        tracing::info!(%identity, logical_time, "participant left");
        self.announce(
            format!("{identity} left at logical time {logical_time}"),
            logical_time,
        );
        Some(logical_time)
    }

    /// Broadcasts a relay-authored message.
    fn announce(&self, content: String, logical_time: u64) {
        let msg = ChatMessage::system(content, logical_time);
        deliver(&self.registry, &ServerFrame::Chat(msg));
    }

    fn info(&self) -> RelayInfo {
        RelayInfo {
            logical_time: self.clock.now(),
            roster: self.registry.roster(),
            slot_count: self.registry.slot_count(),
        }
    }
}

/// Spawns the relay actor and returns a handle to it.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_relay(config: RelayConfig) -> RelayHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = RelayActor {
        registry: ClientRegistry::new(),
        clock: LamportClock::new(),
        config,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RelayHandle { sender: tx }
}
