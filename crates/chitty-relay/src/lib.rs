//! The Chitty relay: Lamport stamping and fan-out.
//!
//! The relay is a single Tokio task (actor model) that owns the
//! [`ClientRegistry`](chitty_registry::ClientRegistry) and the
//! [`LamportClock`](chitty_clock::LamportClock). Connection handlers never
//! touch either directly; they send commands through a [`RelayHandle`].
//!
//! # Key types
//!
//! - [`RelayHandle`]: join, chat, leave, snapshot
//! - [`spawn_relay`]: starts the actor
//! - [`deliver`]: pushes one frame to every registered client
//! - [`RelayConfig`]: command buffer size, content limit

mod broadcast;
mod config;
mod error;
mod relay;

pub use broadcast::{deliver, DeliveryReport};
pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::{spawn_relay, Joined, RelayHandle, RelayInfo};
