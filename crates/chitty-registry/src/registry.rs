//! The client registry: who is connected, and how to reach them.
//!
//! This is the relay's membership table. It is responsible for:
//! - Refusing duplicate, empty or reserved identities at join time
//! - Handing out dense session ids (`1..=N`) and renumbering on departure
//! - Keeping one connection slot per client (plus one for the server)
//! - Giving the broadcaster a way to walk every outbound handle
//!
//! # Concurrency note
//!
//! `ClientRegistry` is NOT thread-safe by itself. It is a plain `HashMap`
//! owned by the relay actor, which processes joins, leaves and messages
//! one at a time. Every read-modify-write of the numbering therefore
//! happens without interleaving.

use std::collections::HashMap;

use chitty_protocol::{SessionId, SERVER_IDENTITY};
use chitty_transport::ConnectionId;

use crate::{ClientSession, OutboundHandle, RegistryError};

/// Tracks every connected chat client.
///
/// ## Dense numbering
///
/// ```text
/// join alice   → alice=1
/// join bob     → alice=1 bob=2
/// join carol   → alice=1 bob=2 carol=3
/// leave alice  → bob=1 carol=2          (everyone above 1 moved down)
/// join dave    → bob=1 carol=2 dave=3
/// ```
///
/// Renumbering is O(n) per departure. Chat rooms are small; keeping the
/// ids dense is worth more than the scan.
#[derive(Debug)]
pub struct ClientRegistry {
    /// All connected clients, keyed by identity.
    sessions: HashMap<String, ClientSession>,

    /// One slot per connected client plus slot 0 for the server.
    ///
    /// This only tracks how many parties are present; the values are
    /// never read as per-client clocks.
    connection_slots: Vec<u64>,
}

impl ClientRegistry {
    /// Creates an empty registry holding only the server's own slot.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            connection_slots: vec![0],
        }
    }

    /// Registers `identity` and returns its session id (`N + 1`).
    ///
    /// # Errors
    /// - [`RegistryError::EmptyIdentity`] for `""`
    /// - [`RegistryError::ReservedIdentity`] for [`SERVER_IDENTITY`]
    /// - [`RegistryError::DuplicateIdentity`] if already connected; the
    ///   existing session is left untouched
    pub fn register(
        &mut self,
        identity: &str,
        connection: ConnectionId,
        outbound: OutboundHandle,
    ) -> Result<SessionId, RegistryError> {
        if identity.is_empty() {
            return Err(RegistryError::EmptyIdentity);
        }
        if identity == SERVER_IDENTITY {
            return Err(RegistryError::ReservedIdentity(identity.to_string()));
        }
        if self.sessions.contains_key(identity) {
            return Err(RegistryError::DuplicateIdentity(identity.to_string()));
        }

        let session_id = SessionId(self.sessions.len() as u64 + 1);
        self.connection_slots.push(0);
        self.sessions.insert(
            identity.to_string(),
            ClientSession {
                identity: identity.to_string(),
                session_id,
                connection,
                outbound,
            },
        );

        tracing::info!(%identity, %session_id, %connection, "client registered");
        Ok(session_id)
    }

    /// Removes `identity`, shifting every higher session id down by one.
    ///
    /// Returns the removed session, or `None` (and changes nothing) if
    /// the identity is empty or not registered.
    pub fn unregister(&mut self, identity: &str) -> Option<ClientSession> {
        if identity.is_empty() {
            return None;
        }
        let removed = self.sessions.remove(identity)?;

        for session in self.sessions.values_mut() {
            if session.session_id > removed.session_id {
                session.session_id = SessionId(session.session_id.0 - 1);
            }
        }

        let slot = removed.session_id.0 as usize;
        if slot < self.connection_slots.len() {
            self.connection_slots.remove(slot);
        } else {
            self.connection_slots.pop();
        }

        tracing::info!(
            %identity,
            session_id = %removed.session_id,
            remaining = self.sessions.len(),
            "client unregistered"
        );
        Some(removed)
    }

    /// Like [`unregister`](Self::unregister), but only if `identity` is
    /// still registered on `connection`.
    ///
    /// Cleanup for a closed stream goes through here, so a connection that
    /// lingers after its identity left and re-joined elsewhere can't
    /// remove the newer session.
    pub fn unregister_connection(
        &mut self,
        identity: &str,
        connection: ConnectionId,
    ) -> Option<ClientSession> {
        match self.sessions.get(identity) {
            Some(session) if session.connection == connection => {
                self.unregister(identity)
            }
            _ => None,
        }
    }

    /// Calls `f` for every registered session except `excluding`.
    ///
    /// Pass `None` to visit everyone. Iteration order is unspecified.
    pub fn for_each_other<F>(&self, excluding: Option<&str>, mut f: F)
    where
        F: FnMut(&ClientSession),
    {
        for session in self.sessions.values() {
            if excluding == Some(session.identity.as_str()) {
                continue;
            }
            f(session);
        }
    }

    /// Returns the outbound handle for `identity`, if connected.
    pub fn stream_for(&self, identity: &str) -> Option<&OutboundHandle> {
        self.sessions.get(identity).map(|s| &s.outbound)
    }

    /// Looks up a session by identity.
    pub fn get(&self, identity: &str) -> Option<&ClientSession> {
        self.sessions.get(identity)
    }

    /// Returns the current session id of `identity`, if connected.
    pub fn session_id(&self, identity: &str) -> Option<SessionId> {
        self.sessions.get(identity).map(|s| s.session_id)
    }

    /// Returns `(session_id, identity)` pairs ordered by session id.
    pub fn roster(&self) -> Vec<(SessionId, String)> {
        let mut roster: Vec<_> = self
            .sessions
            .values()
            .map(|s| (s.session_id, s.identity.clone()))
            .collect();
        roster.sort_unstable_by_key(|(id, _)| *id);
        roster
    }

    /// Number of connection slots (connected clients + 1 for the server).
    pub fn slot_count(&self) -> usize {
        self.connection_slots.len()
    }

    /// Returns the number of connected clients.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
