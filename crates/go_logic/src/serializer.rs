//! Line-oriented board snapshots.
//!
//! ```text
//! <colorToMove>,<capturedByBlack>,<capturedByWhite>
//! 0,0,Empty
//! 1,0,Black
//! ...
//! ```
//!
//! Intersections follow in row-major order (`y` outer, `x` inner). A point
//! the player to move may not take because of ko is written as `Ko`.

use crate::board::Board;
use crate::error::SnapshotError;
use crate::logic::GameLogic;
use crate::stone::Color;
use std::fmt;
use std::str::FromStr;

/// Separator for snapshots pushed to players during a game.
pub const LIVE_SEPARATOR: &str = "\r\n";

/// Separator for snapshots kept as replay states.
pub const REPLAY_SEPARATOR: &str = "!";

/// What a single intersection shows in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Empty,
    Black,
    White,
    Ko,
}

impl Marker {
    pub fn name(self) -> &'static str {
        match self {
            Marker::Empty => "Empty",
            Marker::Black => "Black",
            Marker::White => "White",
            Marker::Ko => "Ko",
        }
    }
}

impl From<Color> for Marker {
    fn from(color: Color) -> Self {
        match color {
            Color::Empty => Marker::Empty,
            Color::Black => Marker::Black,
            Color::White => Marker::White,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Marker {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ko" => Ok(Marker::Ko),
            other => other.parse::<Color>().map(Marker::from),
        }
    }
}

/// Decoded or captured view of a board at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub to_move: Color,
    pub captured_by_black: u32,
    pub captured_by_white: u32,
    pub size: usize,
    /// Row-major markers, `size * size` entries.
    pub cells: Vec<Marker>,
}

impl BoardSnapshot {
    /// Snapshot of a running game, ko point included.
    pub fn capture(game: &GameLogic) -> Self {
        Self::from_board(game.board(), game.current_turn())
    }

    pub fn from_board(board: &Board, to_move: Color) -> Self {
        let size = board.size();
        let mut cells: Vec<Marker> = board.stones().map(|s| Marker::from(s.color)).collect();
        if let Some((x, y)) = board.ko_point() {
            cells[y * size + x] = Marker::Ko;
        }

        Self {
            to_move,
            captured_by_black: board.captured_by(Color::Black),
            captured_by_white: board.captured_by(Color::White),
            size,
            cells,
        }
    }

    pub fn marker(&self, x: usize, y: usize) -> Option<Marker> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.cells.get(y * self.size + x).copied()
    }

    pub fn encode(&self, separator: &str) -> String {
        let mut lines = Vec::with_capacity(self.cells.len() + 1);
        lines.push(format!(
            "{},{},{}",
            self.to_move, self.captured_by_black, self.captured_by_white
        ));
        for (index, marker) in self.cells.iter().enumerate() {
            let (x, y) = (index % self.size, index / self.size);
            lines.push(format!("{x},{y},{marker}"));
        }
        lines.join(separator)
    }

    /// Parses text written by [`encode`](Self::encode) with the same separator.
    pub fn decode(text: &str, separator: &str) -> Result<Self, SnapshotError> {
        let mut lines = text.split(separator).filter(|line| !line.is_empty());
        let header = lines.next().ok_or(SnapshotError::MissingHeader)?;

        let mut fields = header.split(',');
        let (Some(to_move), Some(black), Some(white), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(SnapshotError::MalformedLine(header.to_string()));
        };
        let to_move = to_move.parse::<Color>()?;
        let captured_by_black = parse_number(black, header)?;
        let captured_by_white = parse_number(white, header)?;

        let mut placed = Vec::new();
        for line in lines {
            let mut fields = line.split(',');
            let (Some(x), Some(y), Some(marker), None) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(SnapshotError::MalformedLine(line.to_string()));
            };
            let x: usize = parse_number(x, line)?;
            let y: usize = parse_number(y, line)?;
            placed.push((x, y, marker.parse::<Marker>()?));
        }

        let size = (placed.len() as f64).sqrt() as usize;
        if size * size != placed.len() || size == 0 {
            return Err(SnapshotError::NotSquare(placed.len()));
        }

        let mut cells = vec![Marker::Empty; size * size];
        for (x, y, marker) in placed {
            if x >= size || y >= size {
                return Err(SnapshotError::MalformedLine(format!("{x},{y},{marker}")));
            }
            cells[y * size + x] = marker;
        }

        Ok(Self {
            to_move,
            captured_by_black,
            captured_by_white,
            size,
            cells,
        })
    }
}

fn parse_number<T: FromStr>(field: &str, line: &str) -> Result<T, SnapshotError> {
    field
        .trim()
        .parse()
        .map_err(|_| SnapshotError::MalformedLine(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_board_layout() {
        let game = GameLogic::new(3).unwrap();
        let text = BoardSnapshot::capture(&game).encode(LIVE_SEPARATOR);
        let lines: Vec<&str> = text.split(LIVE_SEPARATOR).collect();

        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "Black,0,0");
        assert_eq!(lines[1], "0,0,Empty");
        assert_eq!(lines[2], "1,0,Empty");
        assert_eq!(lines[4], "0,1,Empty");
        assert_eq!(lines[9], "2,2,Empty");
    }

    #[test]
    fn test_capture_counts_and_ko_marker() {
        let mut game = GameLogic::new(5).unwrap();
        // Black: (1,0) (0,1) (2,1) (1,2); White: (2,0) (3,1) (2,2); White takes at (1,1)
        for (x, y) in [(1, 0), (2, 0), (0, 1), (3, 1), (2, 1), (2, 2), (1, 2)] {
            game.place_stone(x, y).unwrap();
        }
        game.place_stone(1, 1).unwrap();

        let snapshot = BoardSnapshot::capture(&game);
        assert_eq!(snapshot.to_move, Color::Black);
        assert_eq!(snapshot.captured_by_white, 1);
        assert_eq!(snapshot.marker(2, 1), Some(Marker::Ko));
        assert_eq!(snapshot.marker(1, 1), Some(Marker::White));
        assert_eq!(snapshot.marker(7, 0), None);
    }

    #[test]
    fn test_replay_separator_decodes() {
        let mut game = GameLogic::new(4).unwrap();
        game.place_stone(1, 2).unwrap();
        game.place_stone(3, 0).unwrap();

        let snapshot = BoardSnapshot::capture(&game);
        let text = snapshot.encode(REPLAY_SEPARATOR);
        assert!(!text.contains('\n'));

        let decoded = BoardSnapshot::decode(&text, REPLAY_SEPARATOR).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.marker(1, 2), Some(Marker::Black));
        assert_eq!(decoded.marker(3, 0), Some(Marker::White));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(
            BoardSnapshot::decode("", LIVE_SEPARATOR),
            Err(SnapshotError::MissingHeader)
        );
        assert!(matches!(
            BoardSnapshot::decode("Black,0", LIVE_SEPARATOR),
            Err(SnapshotError::MalformedLine(_))
        ));
        assert!(matches!(
            BoardSnapshot::decode("Black,0,0!0,0,Purple", REPLAY_SEPARATOR),
            Err(SnapshotError::UnknownColor(_))
        ));
        assert_eq!(
            BoardSnapshot::decode("Black,0,0!0,0,Empty!1,0,Empty", REPLAY_SEPARATOR),
            Err(SnapshotError::NotSquare(2))
        );
    }
}
