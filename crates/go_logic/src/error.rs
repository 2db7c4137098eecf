//! Error types for rule enforcement and snapshot parsing.

use thiserror::Error;

/// Reasons a move or board operation is refused.
///
/// Every variant is recoverable: the board is left exactly as it was before
/// the failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("coordinate ({x}, {y}) is outside the board")]
    OutOfRange { x: i64, y: i64 },

    #[error("intersection ({x}, {y}) is already occupied")]
    OccupiedCell { x: usize, y: usize },

    #[error("move at ({x}, {y}) recreates the previous position")]
    KoViolation { x: usize, y: usize },

    #[error("move at ({x}, {y}) leaves its own group without liberties")]
    SuicideMove { x: usize, y: usize },

    #[error("the game is already over")]
    GameOver,

    #[error("unsupported board size {0}")]
    InvalidSize(usize),

    #[error("only black or white stones can be placed")]
    InvalidColor,

    #[error("unknown scoring rule '{0}'")]
    UnknownScoreRule(String),
}

/// Failures while decoding a serialized board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no header line")]
    MissingHeader,

    #[error("malformed snapshot line '{0}'")]
    MalformedLine(String),

    #[error("unknown color name '{0}'")]
    UnknownColor(String),

    #[error("{0} intersections do not form a square board")]
    NotSquare(usize),
}
