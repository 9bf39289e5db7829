//! Unified error type for Chitty.

use chitty_protocol::ProtocolError;
use chitty_registry::RegistryError;
use chitty_relay::RelayError;
use chitty_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChittyError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed join, too long).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (duplicate or empty identity).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The relay refused a command or has stopped.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The peer went quiet for longer than allowed.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The server answered with an `Error` frame.
    #[error("server rejected request ({code}): {message}")]
    Rejected {
        /// HTTP-style status code from the server.
        code: u16,
        /// Human-readable reason.
        message: String,
    },

    /// The connection closed before the expected reply arrived.
    #[error("connection closed while waiting for {0}")]
    ClosedEarly(&'static str),
}
