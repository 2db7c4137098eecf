//! Connection management for client connections.
//!
//! Every accepted socket gets a [`client::ClientConnection`] worker driving the
//! handshake and the read loop, plus a writer task fed through the
//! [`PlayerHandle`] that sessions keep for each seat.

pub mod client;

use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier of one client connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Plaintext message; the writer encrypts it when a cipher is active
    Text(String),
    Pong(Vec<u8>),
    /// Close frame with status code; the writer stops after sending it
    Close(u16),
}

/// Send capability to one connection, shared by its worker and the sessions
/// it is seated in.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl PlayerHandle {
    pub fn new(id: ConnectionId, sender: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { id, sender }
    }

    /// A handle with a fresh id and the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::new(), sender), receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a text message. Returns `false` if the connection is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.queue(Outgoing::Text(text.into()))
    }

    pub fn queue(&self, message: Outgoing) -> bool {
        match self.sender.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropped message for closed connection {}", self.id);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
