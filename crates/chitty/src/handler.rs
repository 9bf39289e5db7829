//! Per-connection handler: join, chat routing, and leave.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbound queue into the
//! socket. The flow is:
//!   1. First frame → `Join`, an implicit join via `Chat`, or a one-shot
//!      `Leave` (disconnect notification)
//!   2. Loop: receive frames → relay chat lines, answer rule breaks with
//!      `Error` frames
//!   3. `Leave` or a closed stream → unregister and announce the departure
//!
//! Every frame to the client, replies included, goes through the outbound
//! queue, so a client sees its own replies in order with broadcasts.

use std::sync::Arc;
use std::time::Duration;

use chitty_protocol::{
    ChatMessage, ClientFrame, Codec, ProtocolError, ServerFrame,
};
use chitty_registry::{
    OutboundHandle, OutboundReceiver, RegistryError, SessionState,
};
use chitty_relay::{RelayError, RelayHandle};
use chitty_transport::{
    Connection, ConnectionId, PendingWebSocket, Upgrade, WebSocketConnection,
};

use crate::server::ServerState;
use crate::ChittyError;

/// Unreadable frame, malformed join, or a join on an active session.
const BAD_FRAME: u16 = 400;
/// Frame claims to come from somebody else.
const IDENTITY_MISMATCH: u16 = 403;
/// Join under the relay's own name.
const IDENTITY_RESERVED: u16 = 403;
/// Identity is already connected.
const IDENTITY_TAKEN: u16 = 409;
/// The session was removed by a disconnect notification.
const SESSION_GONE: u16 = 410;
/// Content over the character limit.
const CONTENT_TOO_LONG: u16 = 413;

/// Drop guard that unregisters a client when its handler exits.
///
/// The normal path calls [`release`](Self::release) and awaits the leave.
/// If the handler panics instead, `Drop` still fires; since it's
/// synchronous, it spawns a fire-and-forget task for the leave.
struct Membership {
    identity: String,
    connection: ConnectionId,
    relay: RelayHandle,
    armed: bool,
}

impl Membership {
    fn new(identity: String, connection: ConnectionId, relay: RelayHandle) -> Self {
        Self {
            identity,
            connection,
            relay,
            armed: true,
        }
    }

    /// The registry entry is already gone, nothing to undo.
    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Unregisters this connection's session and announces the departure.
    ///
    /// Scoped to the connection, so a newer session under the same
    /// identity is left alone.
    async fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        match self
            .relay
            .leave_connection(self.identity.as_str(), self.connection)
            .await
        {
            Ok(Some(logical_time)) => tracing::info!(
                identity = %self.identity,
                conn_id = %self.connection,
                logical_time,
                "stream closed without leave, session removed"
            ),
            Ok(None) => {}
            Err(e) => tracing::debug!(
                identity = %self.identity,
                error = %e,
                "cleanup after close failed"
            ),
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let identity = std::mem::take(&mut self.identity);
        let connection = self.connection;
        let relay = self.relay.clone();
        tokio::spawn(async move {
            let _ = relay.leave_connection(identity, connection).await;
        });
    }
}

/// Handles a single connection from accept to close.
///
/// The WebSocket upgrade happens here, under the handshake timeout, so a
/// peer that never sends its upgrade request only ties up its own task.
pub(crate) async fn handle_connection<C: Codec>(
    pending: PendingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), ChittyError> {
    let peer = pending.peer_addr();
    let conn = tokio::time::timeout(
        state.config.handshake_timeout,
        pending.upgrade(),
    )
    .await
    .map_err(|_| {
        tracing::debug!(%peer, "no WebSocket upgrade before the deadline");
        ChittyError::Timeout("websocket upgrade")
    })??;

    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound, rx) = OutboundHandle::channel();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        rx,
        Arc::clone(&state),
    ));

    let result = run_session(&conn, &state, &outbound).await;

    // The relay dropped its clone when the session was unregistered, so
    // this is the last sender. The writer flushes what's queued and stops.
    drop(outbound);
    if let Err(e) = writer.await {
        tracing::debug!(%conn_id, error = %e, "writer task failed");
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }

    tracing::debug!(%conn_id, "connection finished");
    result
}

/// Drives the session state machine until it reaches `Disconnected`.
async fn run_session<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbound: &OutboundHandle,
) -> Result<(), ChittyError> {
    let mut session = SessionState::AwaitingJoin;
    let Some(mut membership) =
        await_join(conn, state, outbound, &mut session).await?
    else {
        return Ok(());
    };

    let result = serve(conn, state, outbound, &mut session, &mut membership).await;

    // Closed, errored, or idle without a leave: same cleanup as a leave.
    membership.release().await;
    result
}

/// Reads the first frame and decides what this connection is.
///
/// Returns the membership guard once a client is registered, or `None`
/// if the connection ended without one (rejected join, disconnect
/// notification, peer went away).
async fn await_join<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbound: &OutboundHandle,
    session: &mut SessionState,
) -> Result<Option<Membership>, ChittyError> {
    let conn_id = conn.id();

    let data = match next_frame(
        conn,
        Some(state.config.handshake_timeout),
        "join",
    )
    .await?
    {
        Some(data) => data,
        None => {
            tracing::debug!(%conn_id, "connection closed before join");
            return Ok(None);
        }
    };

    let frame: ClientFrame = match state.codec.decode(&data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "unreadable first frame");
            reply_error(outbound, BAD_FRAME, e.to_string());
            return Ok(None);
        }
    };

    let (identity, first_line) = match frame {
        ClientFrame::Join { identity } => (identity, None),
        ClientFrame::Chat(msg) => (msg.sender.clone(), Some(msg)),
        ClientFrame::Leave { identity } => {
            disconnect_notification(state, outbound, conn_id, &identity).await?;
            return Ok(None);
        }
    };

    if identity.trim().is_empty() {
        let err = ProtocolError::MalformedJoin(
            "identity must not be empty".into(),
        );
        tracing::warn!(%conn_id, error = %err, "rejecting join");
        reply_error(outbound, BAD_FRAME, err.to_string());
        return Ok(None);
    }

    match state
        .relay
        .join(identity.as_str(), conn_id, outbound.clone())
        .await
    {
        Ok(joined) => {
            tracing::debug!(
                %conn_id,
                %identity,
                session_id = %joined.session_id,
                implicit = first_line.is_some(),
                "join accepted"
            );
        }
        Err(RelayError::Registry(e @ RegistryError::DuplicateIdentity(_))) => {
            tracing::warn!(%conn_id, %identity, "identity already connected");
            reply_error(outbound, IDENTITY_TAKEN, e.to_string());
            return Ok(None);
        }
        Err(RelayError::Registry(e @ RegistryError::ReservedIdentity(_))) => {
            tracing::warn!(%conn_id, %identity, "join under reserved identity");
            reply_error(outbound, IDENTITY_RESERVED, e.to_string());
            return Ok(None);
        }
        Err(RelayError::Registry(e)) => {
            reply_error(outbound, BAD_FRAME, e.to_string());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    let mut membership =
        Membership::new(identity.clone(), conn_id, state.relay.clone());
    *session = SessionState::Active { identity };

    if let Some(msg) = first_line {
        if !relay_chat(state, outbound, session, msg).await? {
            membership.disarm();
            *session = SessionState::Disconnected;
        }
    }

    Ok(Some(membership))
}

/// Receives frames from an active session until it ends.
async fn serve<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbound: &OutboundHandle,
    session: &mut SessionState,
    membership: &mut Membership,
) -> Result<(), ChittyError> {
    let conn_id = conn.id();

    while let Some(identity) = session.identity().map(str::to_owned) {
        let data = match next_frame(conn, state.config.idle_timeout, "next frame")
            .await?
        {
            Some(data) => data,
            None => {
                tracing::info!(%conn_id, %identity, "connection closed");
                break;
            }
        };

        let frame: ClientFrame = match state.codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(
                    %conn_id, %identity, error = %e, "failed to decode frame"
                );
                reply_error(outbound, BAD_FRAME, e.to_string());
                continue;
            }
        };

        match frame {
            ClientFrame::Chat(msg) => {
                if !msg.sender.is_empty() && msg.sender != identity {
                    tracing::warn!(
                        %conn_id,
                        %identity,
                        claimed = %msg.sender,
                        "sender does not match session"
                    );
                    reply_error(
                        outbound,
                        IDENTITY_MISMATCH,
                        format!("session belongs to {identity}, not {}", msg.sender),
                    );
                    continue;
                }
                if !relay_chat(state, outbound, session, msg).await? {
                    membership.disarm();
                    *session = SessionState::Disconnected;
                }
            }

            ClientFrame::Leave { identity: leaving } if leaving == identity => {
                let left_at = state
                    .relay
                    .leave_connection(identity.as_str(), conn_id)
                    .await?;
                membership.disarm();
                tracing::info!(
                    %conn_id,
                    %identity,
                    logical_time = ?left_at,
                    "client left"
                );
                reply(outbound, leave_ack());
                *session = SessionState::Disconnected;
            }

            ClientFrame::Leave { identity: leaving } => {
                tracing::warn!(
                    %conn_id, %identity, %leaving, "leave for another identity"
                );
                reply_error(
                    outbound,
                    IDENTITY_MISMATCH,
                    format!("session belongs to {identity}, not {leaving}"),
                );
            }

            ClientFrame::Join { .. } => {
                reply_error(
                    outbound,
                    BAD_FRAME,
                    format!("already joined as {identity}"),
                );
            }
        }
    }

    Ok(())
}

/// Hands a chat line to the relay and turns refusals into error frames.
///
/// Returns `false` if the session no longer exists in the relay.
async fn relay_chat<C: Codec>(
    state: &ServerState<C>,
    outbound: &OutboundHandle,
    session: &SessionState,
    msg: ChatMessage,
) -> Result<bool, ChittyError> {
    let Some(identity) = session.identity() else {
        return Ok(false);
    };

    match state.relay.chat(identity, msg).await {
        Ok(logical_time) => {
            tracing::debug!(%identity, logical_time, "chat relayed");
            Ok(true)
        }
        Err(RelayError::Protocol(e @ ProtocolError::ContentTooLong { .. })) => {
            tracing::warn!(%identity, error = %e, "chat rejected");
            reply_error(outbound, CONTENT_TOO_LONG, e.to_string());
            Ok(true)
        }
        Err(RelayError::NotJoined(_)) => {
            tracing::info!(%identity, "session was removed by a disconnect notification");
            reply_error(
                outbound,
                SESSION_GONE,
                format!("{identity} is no longer connected"),
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles `Leave` as the first frame: somebody is reporting that
/// `identity` is gone. Performs the leave and acknowledges it.
async fn disconnect_notification<C: Codec>(
    state: &ServerState<C>,
    outbound: &OutboundHandle,
    conn_id: ConnectionId,
    identity: &str,
) -> Result<(), ChittyError> {
    let left_at = state.relay.leave(identity).await?;
    tracing::info!(
        %conn_id,
        %identity,
        logical_time = ?left_at,
        "disconnect notification"
    );
    reply(outbound, leave_ack());
    Ok(())
}

/// Waits for the next inbound message, with an optional deadline.
async fn next_frame(
    conn: &WebSocketConnection,
    limit: Option<Duration>,
    waiting_for: &'static str,
) -> Result<Option<Vec<u8>>, ChittyError> {
    let received = match limit {
        Some(limit) => tokio::time::timeout(limit, conn.recv())
            .await
            .map_err(|_| ChittyError::Timeout(waiting_for))?,
        None => conn.recv().await,
    };
    Ok(received?)
}

/// Drains the outbound queue into the socket.
///
/// Stops when every sender is gone or a send fails. After a failed send
/// the receiver is dropped, so further pushes to this client fail fast.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut rx: OutboundReceiver,
    state: Arc<ServerState<C>>,
) {
    let conn_id = conn.id();

    while let Some(frame) = rx.recv().await {
        let bytes = match state.codec.encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

fn leave_ack() -> ServerFrame {
    ServerFrame::LeaveAck {
        message: "success".to_string(),
    }
}

fn reply(outbound: &OutboundHandle, frame: ServerFrame) {
    // Fails only if the writer already stopped; nothing left to tell.
    let _ = outbound.push(frame);
}

fn reply_error(outbound: &OutboundHandle, code: u16, message: impl Into<String>) {
    reply(
        outbound,
        ServerFrame::Error {
            code,
            message: message.into(),
        },
    );
}
