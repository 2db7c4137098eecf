//! Listener setup and the accept loop.

mod core;

pub use self::core::GameServer;
