//! # Chitty
//!
//! Multi-party chat relay with Lamport-stamped fan-out.
//!
//! Clients connect over WebSocket, join under a unique identity, and send
//! chat lines. The relay stamps each line with a Lamport timestamp and
//! delivers it to every connected client, sender included, in one global
//! order. Joins and departures are announced the same way, authored by
//! `"Server"`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chitty::prelude::*;
//!
//! # async fn run() -> Result<(), ChittyError> {
//! let server = ChittyServer::builder()
//!     .name("lobby")
//!     .bind("127.0.0.1:5400")
//!     .build()
//!     .await?;
//! tokio::spawn(server.run());
//!
//! let alice = ChatClient::connect("127.0.0.1:5400", "alice").await?;
//! alice.send("hi").await?;
//! while let Some(frame) = alice.recv().await? {
//!     if let Some(msg) = frame.as_chat() {
//!         println!("[{}] {}: {}", msg.logical_timestamp, msg.sender, msg.content);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod handler;
mod server;

pub use client::{disconnect, ChatClient};
pub use error::ChittyError;
pub use server::{ChittyServer, ChittyServerBuilder, ServerConfig};

pub use chitty_protocol as protocol;
pub use chitty_relay as relay;

/// Everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{disconnect, ChatClient, ChittyError, ChittyServer};
    pub use chitty_protocol::{
        ChatMessage, ServerFrame, SessionId, MAX_CONTENT_CHARS,
    };
    pub use chitty_relay::{RelayConfig, RelayInfo};
}
