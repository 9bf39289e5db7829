//! `ChittyServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → protocol → relay (registry + clock).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chitty_protocol::{Codec, JsonCodec};
use chitty_relay::{spawn_relay, RelayConfig, RelayHandle};
use chitty_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::ChittyError;

/// Per-connection settings shared by every handler task.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Display name of this server, used in logs.
    pub name: String,

    /// How long a new connection may take to finish the WebSocket upgrade,
    /// and then again to send its first frame.
    pub handshake_timeout: Duration,

    /// Drop a joined client after this long without a frame. `None`
    /// keeps quiet clients connected indefinitely.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: None,
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) relay: RelayHandle,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Chitty server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use chitty::ChittyServer;
///
/// # async fn run() -> Result<(), chitty::ChittyError> {
/// let server = ChittyServer::builder()
///     .name("lobby")
///     .bind("127.0.0.1:5400")
///     .handshake_timeout(Duration::from_secs(10))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChittyServerBuilder {
    bind_addr: String,
    config: ServerConfig,
    relay_config: RelayConfig,
}

impl ChittyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5400".to_string(),
            config: ServerConfig::default(),
            relay_config: RelayConfig::default(),
        }
    }

    /// Sets the server's display name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a connection may wait before its first frame.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Disconnects joined clients that stay silent for `timeout`.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the relay configuration.
    pub fn relay_config(mut self, config: RelayConfig) -> Self {
        self.relay_config = config;
        self
    }

    /// Binds the listener and starts the relay actor.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    ///
    /// # Errors
    /// [`ChittyError::Transport`] if the address can't be bound. This is
    /// the only failure that stops a server from starting.
    pub async fn build(self) -> Result<ChittyServer<JsonCodec>, ChittyError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            relay: spawn_relay(self.relay_config),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(ChittyServer { transport, state })
    }
}

impl Default for ChittyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Chitty server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChittyServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl ChittyServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ChittyServerBuilder {
        ChittyServerBuilder::new()
    }
}

impl<C: Codec> ChittyServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the relay, for inspecting state.
    pub fn relay(&self) -> RelayHandle {
        self.state.relay.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ChittyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted connection gets its own task, which also performs
    /// the WebSocket upgrade. A failed accept or a failed session is
    /// logged and never stops the loop.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), ChittyError>
    where
        F: Future<Output = ()> + Send,
    {
        let server = self.state.config.name.clone();
        tracing::info!(%server, "Chitty server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(%server, "shutting down, no longer accepting");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        Ok(())
    }
}
