//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct, which owns the session
//! registry and the command dispatcher and spawns one connection worker per
//! accepted socket.

use crate::{
    command::Dispatcher,
    config::ServerConfig,
    connection::client::ClientConnection,
    error::{ProtocolError, ServerError},
    session::SessionRegistry,
    store::GameStore,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch, Semaphore};
use tracing::{debug, error, info, warn};

/// The core game server structure.
///
/// `GameServer` accepts sockets, hands each one to a [`ClientConnection`]
/// worker and shares a single [`Dispatcher`] between all of them, so every
/// connection sees the same sessions.
pub struct GameServer {
    /// Server configuration settings
    config: Arc<ServerConfig>,

    /// Every custom and matchmaking session
    registry: Arc<SessionRegistry>,

    /// Command handlers shared by all connections
    dispatcher: Dispatcher,

    /// Caps the number of live connections
    connection_limit: Arc<Semaphore>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    /// Address actually bound, published once the listener is up
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl GameServer {
    /// Creates a new game server with the specified configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration parameters
    /// * `store` - Persistence collaborator for users, games and ratings
    ///
    /// # Returns
    ///
    /// A new `GameServer` instance ready to be started.
    pub fn new(config: ServerConfig, store: Arc<dyn GameStore>) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        let (local_addr, _) = watch::channel(None);
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), store, config.game.clone());

        Self {
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            registry,
            dispatcher,
            shutdown_sender,
            local_addr,
        }
    }

    /// Starts the server and runs the accept loop until shutdown.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a `ServerError`
    /// if the listener could not be set up.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting game server on {}", self.config.bind_address);
        info!(
            "📐 Board sizes {:?}, {}s per player, cipher {}",
            self.config.game.board_sizes,
            self.config.game.main_time.as_secs(),
            if self.config.protocol.shared_secret.is_some() { "available" } else { "disabled" }
        );

        let listener = self.bind()?;
        let bound = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Local address unavailable: {e}")))?;
        self.local_addr.send_replace(Some(bound));
        info!("✅ Listener bound on {}", bound);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn bind(&self) -> Result<TcpListener, ServerError> {
        let domain = if self.config.bind_address.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        socket
            .bind(&self.config.bind_address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        std_listener.set_nonblocking(true).ok();

        TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        let Ok(permit) = self.connection_limit.clone().try_acquire_owned() else {
            warn!("🚫 Connection limit of {} reached, dropping {}", self.config.max_connections, addr);
            return;
        };
        stream.set_nodelay(true).ok();

        let connection = ClientConnection::new(addr);
        let dispatcher = self.dispatcher.clone();
        let config = self.config.clone();

        // Spawn individual connection handler
        tokio::spawn(async move {
            let id = connection.id();
            match connection.run(stream, dispatcher, config).await {
                Ok(()) => {}
                Err(ProtocolError::Io(e)) => debug!("Connection {} dropped: {}", id, e),
                Err(e) => warn!("Connection {} from {} failed: {}", id, addr, e),
            }
            drop(permit);
        });
    }

    /// Initiates graceful shutdown of the server.
    ///
    /// Stops the accept loop; running connections finish on their own.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Waits until the listener is bound and returns its address.
    ///
    /// Useful when the configured port is `0`.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut receiver = self.local_addr.subscribe();
        let bound = match receiver.wait_for(Option::is_some).await {
            Ok(addr) => *addr,
            Err(_) => None,
        };
        bound
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_bind_failure_is_network_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            bind_address: taken.local_addr().unwrap(),
            ..ServerConfig::default()
        };
        let server = GameServer::new(config, Arc::new(MemoryStore::default()));
        assert!(matches!(server.start().await, Err(ServerError::Network(_))));
    }
}
