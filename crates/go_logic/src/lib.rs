//! # Go Logic - Authoritative Rules for Two-Player Sessions
//!
//! Pure, synchronous game logic used by the session server. Nothing in this
//! crate touches the network or the clock of the host beyond `Instant`
//! arithmetic, so every rule can be exercised directly from tests.
//!
//! ## Components
//!
//! * **Board** ([`Board`]) - grid of [`Stone`]s, capture resolution, suicide
//!   and ko detection, capture counters per color
//! * **Game logic** ([`GameLogic`]) - color to move, pass counting and the
//!   terminal states of a game (double pass, resignation, timeout, abandonment)
//! * **Scoring** ([`ScoreRule`]) - area and territory counting over a board
//! * **Clocks** ([`TimerManager`]) - two countdown clocks switched on each move
//! * **Serialization** ([`BoardSnapshot`]) - the line-oriented board format
//!   sent to clients and stored for replays
//!
//! ## Example
//!
//! ```rust
//! use go_logic::{Color, GameLogic};
//!
//! let mut game = GameLogic::new(9).unwrap();
//! game.place_stone(2, 2).unwrap();
//! assert_eq!(game.current_turn(), Color::White);
//!
//! game.skip_turn().unwrap();
//! game.skip_turn().unwrap();
//! assert!(game.is_end_game());
//! ```

pub mod board;
pub mod error;
pub mod logic;
pub mod score;
pub mod serializer;
pub mod stone;
pub mod timer;

pub use board::{Board, MoveOutcome};
pub use error::{RuleError, SnapshotError};
pub use logic::{EndReason, GameLogic};
pub use score::{Score, ScoreRule, Territory};
pub use serializer::{BoardSnapshot, Marker, LIVE_SEPARATOR, REPLAY_SEPARATOR};
pub use stone::{Color, Stone};
pub use timer::{Clock, TimerManager};
