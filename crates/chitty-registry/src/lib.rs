//! Client registry for Chitty.
//!
//! This crate is the relay's memory of who is connected:
//!
//! 1. **Membership**: one [`ClientSession`] per identity ([`ClientRegistry`])
//! 2. **Numbering**: dense session ids, renumbered when someone leaves
//! 3. **Reachability**: an [`OutboundHandle`] per client for fan-out
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)  ← owns the registry and the clock, serializes access
//!     ↕
//! Registry (this crate)  ← identity → session id + outbound handle
//!     ↕
//! Protocol / Transport (below)  ← SessionId, ServerFrame, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::RegistryError;
pub use registry::ClientRegistry;
pub use session::{ClientSession, OutboundHandle, OutboundReceiver, SessionState};
