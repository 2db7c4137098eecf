//! Error types for the session server.
//!
//! Three layers fail independently:
//!
//! * [`ServerError`] - server lifecycle (binding, configuration). Fatal to the process.
//! * [`ProtocolError`] - handshake, framing and payload cipher. Fatal to one connection.
//! * [`GameError`] - a refused command. Reported to the invoking player, who stays connected.

use crate::store::StoreError;
use go_logic::RuleError;
use thiserror::Error;

/// Errors that can occur while starting or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related errors such as bind failures
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid configuration detected at startup
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of the wire protocol on a single connection.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("handshake is missing the Sec-WebSocket-Key header")]
    MissingKey,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("client frame is not masked")]
    UnmaskedFrame,

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: u64, max: usize },

    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("payload cipher failure: {0}")]
    Cipher(String),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command the server refused to apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("session {0} does not exist")]
    NotFound(u32),

    #[error("session {0} already has two players")]
    SessionFull(u32),

    #[error("you are not seated in session {0}")]
    NotSeated(u32),

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the game has not started")]
    NotStarted,

    #[error("the game has already started")]
    AlreadyStarted,

    #[error("{0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// Short name sent to clients in `Error:<Kind>:<detail>` messages.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Rule(RuleError::OutOfRange { .. }) => "OutOfRange",
            GameError::Rule(RuleError::OccupiedCell { .. }) => "OccupiedCell",
            GameError::Rule(RuleError::KoViolation { .. }) => "KoViolation",
            GameError::Rule(RuleError::SuicideMove { .. }) => "SuicideMove",
            GameError::Rule(RuleError::GameOver) => "GameOver",
            GameError::Rule(_) => "InvalidRule",
            GameError::NotFound(_) => "NotFound",
            GameError::SessionFull(_) => "SessionFull",
            GameError::NotSeated(_) => "NotSeated",
            GameError::NotYourTurn => "NotYourTurn",
            GameError::NotStarted => "NotStarted",
            GameError::AlreadyStarted => "AlreadyStarted",
            GameError::InvalidCommand(_) => "InvalidCommand",
            GameError::Store(StoreError::NotFound(_)) => "UnknownUser",
            GameError::Store(_) => "Store",
        }
    }
}
