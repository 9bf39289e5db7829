//! Error types for the registry layer.

/// Errors that can occur while registering clients or reaching them.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Someone with this identity is already connected.
    ///
    /// Identities are unique among connected clients. The second client
    /// is refused; the first keeps its session and stream.
    #[error("identity {0} is already connected")]
    DuplicateIdentity(String),

    /// The empty string is not a usable identity.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// The identity belongs to the relay itself (`"Server"`).
    ///
    /// Relay announcements are authored under this name, so no client
    /// may join as it.
    #[error("identity {0} is reserved")]
    ReservedIdentity(String),

    /// A delivery target's stream is gone (it disconnected mid-broadcast).
    ///
    /// Non-fatal: the broadcaster logs it and moves on. Removing the
    /// session is left to that client's own handler.
    #[error("recipient {0} is no longer reachable")]
    UnknownRecipient(String),
}
