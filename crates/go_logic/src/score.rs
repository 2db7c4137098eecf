//! Area and territory scoring.

use crate::board::Board;
use crate::error::RuleError;
use crate::stone::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scoring variant chosen when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreRule {
    /// Stones on the board plus surrounded empty points
    Area,
    /// Captured stones plus surrounded empty points
    Territory,
}

/// Points per color. Black sits in the first seat, white in the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub black: u32,
    pub white: u32,
}

impl Score {
    /// `(first seat, second seat)`.
    pub fn seats(&self) -> (u32, u32) {
        (self.black, self.white)
    }
}

/// Empty points owned by each color, and those touching both or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Territory {
    pub black: u32,
    pub white: u32,
    pub neutral: u32,
}

impl ScoreRule {
    pub fn calculate(&self, board: &Board) -> Score {
        let territory = territory(board);
        match self {
            ScoreRule::Area => Score {
                black: board.count(Color::Black) + territory.black,
                white: board.count(Color::White) + territory.white,
            },
            ScoreRule::Territory => Score {
                black: board.captured_by(Color::Black) + territory.black,
                white: board.captured_by(Color::White) + territory.white,
            },
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ScoreRule::Area => "area",
            ScoreRule::Territory => "territory",
        }
    }
}

impl fmt::Display for ScoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ScoreRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "area" | "c" | "chinese" => Ok(ScoreRule::Area),
            "territory" | "j" | "japanese" => Ok(ScoreRule::Territory),
            _ => Err(RuleError::UnknownScoreRule(s.to_string())),
        }
    }
}

/// Flood-fills every maximal empty region and awards it to the single color
/// on its border. Regions bordered by both colors, or by none, stay neutral.
pub fn territory(board: &Board) -> Territory {
    let size = board.size();
    let mut visited = vec![false; size * size];
    let mut result = Territory::default();

    for stone in board.stones().filter(|s| s.is_empty()) {
        if visited[stone.y * size + stone.x] {
            continue;
        }

        let region = board.group(stone);
        let (mut touches_black, mut touches_white) = (false, false);
        for cell in &region {
            visited[cell.y * size + cell.x] = true;
            for neighbor in board.neighbors(cell) {
                match neighbor.color {
                    Color::Black => touches_black = true,
                    Color::White => touches_white = true,
                    Color::Empty => {}
                }
            }
        }

        let points = region.len() as u32;
        match (touches_black, touches_white) {
            (true, false) => result.black += points,
            (false, true) => result.white += points,
            _ => result.neutral += points,
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(rows: &[&str]) -> Board {
        let mut board = Board::new(rows.len()).unwrap();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                match c {
                    'B' => board.set_color(x, y, Color::Black),
                    'W' => board.set_color(x, y, Color::White),
                    _ => {}
                }
            }
        }
        board
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!("c".parse::<ScoreRule>().unwrap(), ScoreRule::Area);
        assert_eq!("Japanese".parse::<ScoreRule>().unwrap(), ScoreRule::Territory);
        assert!("x".parse::<ScoreRule>().is_err());
    }

    #[test]
    fn test_empty_board_scores_nothing() {
        let board = Board::new(9).unwrap();
        let score = ScoreRule::Area.calculate(&board);
        assert_eq!(score, Score::default());
        assert_eq!(territory(&board).neutral, 81);
    }

    #[test]
    fn test_split_board_area() {
        let board = board_from(&[
            "..BW.",
            "..BW.",
            "..BW.",
            "..BW.",
            "..BW.",
        ]);
        let score = ScoreRule::Area.calculate(&board);
        assert_eq!(score.black, 15);
        assert_eq!(score.white, 10);
        assert_eq!(score.black + score.white, 25);
    }

    #[test]
    fn test_shared_region_is_neutral() {
        let board = board_from(&[
            ".B.W.",
            ".....",
            ".....",
            ".....",
            ".....",
        ]);
        let territory = territory(&board);
        assert_eq!(territory.black + territory.white, 0);
        assert_eq!(territory.neutral, 23);
        let score = ScoreRule::Area.calculate(&board);
        assert!(score.black + score.white < 25);
    }

    #[test]
    fn test_territory_counts_captures_not_stones() {
        let mut board = board_from(&[
            ".B...",
            "BW...",
            ".B...",
            ".....",
            ".....",
        ]);
        board.place_stone(2, 1, Color::Black).unwrap();
        let territory_score = ScoreRule::Territory.calculate(&board);
        let area_score = ScoreRule::Area.calculate(&board);
        // black owns the whole board: 21 empty points, 4 stones, 1 capture
        assert_eq!(area_score.black, 25);
        assert_eq!(territory_score.black, 21 + 1);
        assert_eq!(territory_score.white, 0);
    }
}
