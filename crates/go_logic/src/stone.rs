//! Stones and colors.

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Color {
    #[default]
    Empty,
    Black,
    White,
}

impl Color {
    /// The other player's color. `Empty` has no opponent and maps to itself.
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
            Color::Empty => Color::Empty,
        }
    }

    /// Wire name of the color.
    pub fn name(self) -> &'static str {
        match self {
            Color::Empty => "Empty",
            Color::Black => "Black",
            Color::White => "White",
        }
    }

    /// Slot of this color in per-color arrays, `None` for `Empty`.
    pub(crate) fn slot(self) -> Option<usize> {
        match self {
            Color::Black => Some(0),
            Color::White => Some(1),
            Color::Empty => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Empty" => Ok(Color::Empty),
            "Black" => Ok(Color::Black),
            "White" => Ok(Color::White),
            other => Err(SnapshotError::UnknownColor(other.to_string())),
        }
    }
}

/// A single intersection of the board.
///
/// The coordinates never change once the board is built; only the color does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stone {
    pub x: usize,
    pub y: usize,
    pub color: Color,
}

impl Stone {
    pub fn new(x: usize, y: usize, color: Color) -> Self {
        Self { x, y, color }
    }

    pub fn is_empty(&self) -> bool {
        self.color == Color::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(Color::White.opponent(), Color::Black);
        assert_eq!(Color::Empty.opponent(), Color::Empty);
    }

    #[test]
    fn test_color_names_parse_back() {
        for color in [Color::Empty, Color::Black, Color::White] {
            assert_eq!(color.name().parse::<Color>().unwrap(), color);
        }
        assert!("Ko".parse::<Color>().is_err());
    }
}
