//! Server configuration types and defaults.
//!
//! This module contains the configuration handed to [`GameServer`](crate::GameServer)
//! by the binary, already parsed and validated.

use std::net::SocketAddr;
use std::time::Duration;

/// Board sizes a session may be created with unless configured otherwise.
pub const DEFAULT_BOARD_SIZES: [usize; 3] = [9, 13, 19];

/// Configuration structure for the game server.
///
/// Contains network settings, connection limits, game rules and the optional
/// payload cipher secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Largest accepted frame payload, in bytes
    pub max_frame_size: usize,

    /// Game rules applied to every session
    pub game: GameSettings,

    /// Wire protocol options
    pub protocol: ProtocolSettings,
}

/// Rules shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// Thinking time each player starts with
    pub main_time: Duration,

    /// Board sizes accepted by `Create`
    pub board_sizes: Vec<usize>,
}

/// Wire protocol options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Pre-shared secret enabling the ChaCha20-Poly1305 payload cipher
    pub shared_secret: Option<String>,
}

impl GameSettings {
    pub fn allows_size(&self, size: usize) -> bool {
        self.board_sizes.contains(&size)
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            main_time: Duration::from_secs(600),
            board_sizes: DEFAULT_BOARD_SIZES.to_vec(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            max_frame_size: 64 * 1024,
            game: GameSettings::default(),
            protocol: ProtocolSettings::default(),
        }
    }
}
