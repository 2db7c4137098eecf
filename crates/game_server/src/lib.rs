//! # Game Server - Two-Player Go Sessions
//!
//! An authoritative session server for Go matches. Clients speak a small text
//! command grammar over a self-contained WebSocket transport; the server
//! validates every move with [`go_logic`], keeps each player's clock, scores
//! finished games and updates both players' ratings.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Protocol** - HTTP upgrade, frame codec and optional payload cipher ([`protocol`])
//! * **Connections** - One worker per socket plus a writer task ([`connection`])
//! * **Commands** - Grammar parsing and one handler per verb ([`command`])
//! * **Sessions** - Match state and the custom/matchmaking pools ([`session`])
//! * **Store** - Persistence collaborator for users, games and replays ([`store`])
//! * **Ratings** - Elo updates applied once per finished game ([`rating`])
//!
//! ### Message Flow
//!
//! 1. Client sends a text frame such as `Place_custom/3/4,4`
//! 2. The payload is decrypted if the cipher was negotiated
//! 3. The command is parsed and routed to its handler
//! 4. The handler mutates the session under its lock
//! 5. The response goes to the invoker or to both seats as `3/Move:...`
//!
//! ## Configuration
//!
//! The server is configured through the [`ServerConfig`] struct:
//!
//! * **Network settings** - Bind address, connection limit, frame size limit
//! * **Game settings** - Main time per player and the allowed board sizes
//! * **Protocol settings** - Shared secret enabling the payload cipher
//!
//! ## Error Handling
//!
//! * [`ServerError`] - startup and listener failures
//! * [`ProtocolError`] - ends one connection
//! * [`GameError`] - a refused command, reported as `<id>/Error:<Kind>:<detail>`
//!
//! ## Thread Safety
//!
//! Sessions live behind `Arc<tokio::sync::Mutex<_>>` inside `DashMap` pools, so
//! commands on one session are applied one at a time while different sessions
//! proceed in parallel.

pub use command::{Dispatcher, Response};
pub use config::{GameSettings, ProtocolSettings, ServerConfig};
pub use error::{GameError, ProtocolError, ServerError};
pub use server::GameServer;
pub use store::{GameStore, MemoryStore, StoreError, UserProfile};

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod rating;
pub mod server;
pub mod session;
pub mod store;
