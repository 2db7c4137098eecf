//! Game sessions and the registry that owns them.

pub mod game;
pub mod registry;

pub use game::{seat_color, GameSession, Outcome, Release, Seat};
pub use registry::{SessionRegistry, SharedSession};

use crate::error::GameError;
use std::fmt;
use std::str::FromStr;

/// Pool a session belongs to. Ids are only unique within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Created by one player, joined by id by another
    Custom,
    /// Paired automatically by size and rule
    Matchmaking,
}

impl SessionKind {
    pub fn tag(self) -> &'static str {
        match self {
            SessionKind::Custom => "custom",
            SessionKind::Matchmaking => "matchmaking",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SessionKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(SessionKind::Custom),
            "matchmaking" => Ok(SessionKind::Matchmaking),
            other => Err(GameError::InvalidCommand(format!(
                "unknown session kind '{other}'"
            ))),
        }
    }
}
