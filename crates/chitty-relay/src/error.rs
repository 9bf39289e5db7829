//! Error types for the relay layer.

use chitty_protocol::ProtocolError;
use chitty_registry::RegistryError;

/// Errors that can occur when asking the relay to do something.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The registry refused the operation (duplicate or empty identity).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The frame broke a protocol rule (e.g. content too long).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A chat line arrived for an identity that isn't registered, usually
    /// because a disconnect notification removed it first.
    #[error("{0} is not joined")]
    NotJoined(String),

    /// The relay actor has stopped and can't take commands.
    #[error("relay is unavailable")]
    Unavailable,
}
