//! Turn order and terminal states on top of the [`Board`].

use crate::board::{Board, MoveOutcome};
use crate::error::RuleError;
use crate::stone::Color;
use tracing::debug;

/// Why a game finished. The carried color is the side that lost by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Both players passed in a row; the winner is decided by score
    DoublePass,
    Resignation(Color),
    Timeout(Color),
    /// The player left a running game
    Abandonment(Color),
}

impl EndReason {
    /// The color that forfeited, `None` when the score decides.
    pub fn forfeited_by(&self) -> Option<Color> {
        match self {
            EndReason::DoublePass => None,
            EndReason::Resignation(color)
            | EndReason::Timeout(color)
            | EndReason::Abandonment(color) => Some(*color),
        }
    }
}

/// A game in progress: board, color to move, passes and end state.
///
/// Black always moves first.
#[derive(Debug, Clone)]
pub struct GameLogic {
    board: Board,
    current_turn: Color,
    consecutive_passes: u8,
    end: Option<EndReason>,
}

impl GameLogic {
    pub fn new(size: usize) -> Result<Self, RuleError> {
        Ok(Self {
            board: Board::new(size)?,
            current_turn: Color::Black,
            consecutive_passes: 0,
            end: None,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Color of the player expected to move.
    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    /// Plays a stone for the color to move and hands the turn over.
    pub fn place_stone(&mut self, x: i64, y: i64) -> Result<MoveOutcome, RuleError> {
        self.ensure_running()?;
        let outcome = self.board.place_stone(x, y, self.current_turn)?;
        self.consecutive_passes = 0;
        self.current_turn = self.current_turn.opponent();
        Ok(outcome)
    }

    /// Passes for the color to move. The second pass in a row ends the game.
    pub fn skip_turn(&mut self) -> Result<(), RuleError> {
        self.ensure_running()?;
        self.board.pass();
        self.consecutive_passes += 1;
        self.current_turn = self.current_turn.opponent();

        if self.consecutive_passes >= 2 {
            debug!("Two consecutive passes, game over");
            self.end = Some(EndReason::DoublePass);
        }
        Ok(())
    }

    pub fn resign(&mut self, color: Color) -> Result<(), RuleError> {
        self.finish(EndReason::Resignation(color))
    }

    pub fn time_out(&mut self, color: Color) -> Result<(), RuleError> {
        self.finish(EndReason::Timeout(color))
    }

    pub fn abandon(&mut self, color: Color) -> Result<(), RuleError> {
        self.finish(EndReason::Abandonment(color))
    }

    pub fn is_end_game(&self) -> bool {
        self.end.is_some()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end
    }

    fn finish(&mut self, reason: EndReason) -> Result<(), RuleError> {
        self.ensure_running()?;
        self.end = Some(reason);
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), RuleError> {
        if self.end.is_some() {
            return Err(RuleError::GameOver);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_alternate() {
        let mut game = GameLogic::new(9).unwrap();
        assert_eq!(game.current_turn(), Color::Black);
        game.place_stone(0, 0).unwrap();
        assert_eq!(game.current_turn(), Color::White);
        game.place_stone(1, 1).unwrap();
        assert_eq!(game.current_turn(), Color::Black);
    }

    #[test]
    fn test_rejected_move_keeps_turn() {
        let mut game = GameLogic::new(9).unwrap();
        game.place_stone(0, 0).unwrap();
        assert!(game.place_stone(0, 0).is_err());
        assert_eq!(game.current_turn(), Color::White);
    }

    #[test]
    fn test_double_pass_ends_game() {
        let mut game = GameLogic::new(9).unwrap();
        game.skip_turn().unwrap();
        assert!(!game.is_end_game());
        game.skip_turn().unwrap();
        assert_eq!(game.end_reason(), Some(EndReason::DoublePass));
        assert_eq!(game.place_stone(0, 0).unwrap_err(), RuleError::GameOver);
    }

    #[test]
    fn test_move_between_passes_resets_count() {
        let mut game = GameLogic::new(9).unwrap();
        game.skip_turn().unwrap();
        game.place_stone(3, 3).unwrap();
        game.skip_turn().unwrap();
        assert!(!game.is_end_game());
    }

    #[test]
    fn test_resignation_is_terminal() {
        let mut game = GameLogic::new(9).unwrap();
        game.resign(Color::White).unwrap();
        assert_eq!(game.end_reason().and_then(|r| r.forfeited_by()), Some(Color::White));
        assert_eq!(game.time_out(Color::Black).unwrap_err(), RuleError::GameOver);
    }
}
