//! Wire protocol for Chitty.
//!
//! This crate defines the "language" that chat clients and the relay
//! speak:
//!
//! - **Types** ([`ClientFrame`], [`ServerFrame`], [`ChatMessage`],
//!   [`SessionId`]): the frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding or
//!   validating a frame.
//!
//! The protocol layer doesn't know about connections or the registry.
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Relay (registry + clock)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    validate_content, ChatMessage, ClientFrame, ServerFrame, SessionId,
    MAX_CONTENT_CHARS, SERVER_IDENTITY,
};
