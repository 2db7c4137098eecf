//! Board state and capture rules.
//!
//! The board owns the grid, the snapshot used for ko comparison and the
//! capture counters. All rule checks happen in [`Board::place_stone`]; a
//! refused move leaves the board untouched.

use crate::error::RuleError;
use crate::stone::{Color, Stone};
use std::collections::VecDeque;
use tracing::trace;

/// Smallest accepted board.
pub const MIN_SIZE: usize = 2;
/// Largest accepted board.
pub const MAX_SIZE: usize = 25;

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The stone that was placed
    pub placed: Stone,
    /// Opponent stones removed by the move, with their color before removal
    pub captured: Vec<Stone>,
}

/// A square Go board.
///
/// # Ko
///
/// The board keeps the grid as it was before the previous move. A move whose
/// resulting grid equals that snapshot would recreate the position from two
/// plies ago and is refused with [`RuleError::KoViolation`]. This is a
/// one-snapshot comparison, not positional superko.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    stones: Vec<Stone>,
    previous: Option<Vec<Stone>>,
    /// Stones captured by black and by white
    captures: [u32; 2],
    /// Cell emptied by a single-stone capture and the color barred from it
    ko_candidate: Option<(usize, usize, Color)>,
}

impl Board {
    /// Creates an empty board.
    ///
    /// # Errors
    ///
    /// [`RuleError::InvalidSize`] when `size` is outside `MIN_SIZE..=MAX_SIZE`.
    pub fn new(size: usize) -> Result<Self, RuleError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(RuleError::InvalidSize(size));
        }

        let mut stones = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                stones.push(Stone::new(x, y, Color::Empty));
            }
        }

        Ok(Self {
            size,
            stones,
            previous: None,
            captures: [0, 0],
            ko_candidate: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `(x, y)` lies inside the grid.
    pub fn is_valid_coordinate(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size
    }

    /// Returns the stone at `(x, y)`.
    pub fn stone(&self, x: i64, y: i64) -> Result<Stone, RuleError> {
        Ok(self.stones[self.index(x, y)?])
    }

    /// All intersections in row-major order (`y` outer, `x` inner).
    pub fn stones(&self) -> impl Iterator<Item = &Stone> {
        self.stones.iter()
    }

    /// Number of stones captured by `color`.
    pub fn captured_by(&self, color: Color) -> u32 {
        color.slot().map(|slot| self.captures[slot]).unwrap_or(0)
    }

    /// Number of stones of `color` currently on the board.
    pub fn count(&self, color: Color) -> u32 {
        self.stones.iter().filter(|s| s.color == color).count() as u32
    }

    /// The up-to-four orthogonal neighbors of `stone`, with their current colors.
    pub fn neighbors(&self, stone: &Stone) -> Vec<Stone> {
        let mut result = Vec::with_capacity(4);
        let (x, y) = (stone.x, stone.y);

        if y > 0 {
            result.push(self.stones[self.offset(x, y - 1)]);
        }
        if y + 1 < self.size {
            result.push(self.stones[self.offset(x, y + 1)]);
        }
        if x > 0 {
            result.push(self.stones[self.offset(x - 1, y)]);
        }
        if x + 1 < self.size {
            result.push(self.stones[self.offset(x + 1, y)]);
        }

        result
    }

    /// The maximal connected group of same-colored intersections containing `stone`.
    ///
    /// Works for empty regions too, which is what the scorer relies on.
    pub fn group(&self, stone: &Stone) -> Vec<Stone> {
        let origin = self.stones[self.offset(stone.x, stone.y)];
        let mut visited = vec![false; self.stones.len()];
        let mut queue = VecDeque::from([origin]);
        let mut group = Vec::new();
        visited[self.offset(origin.x, origin.y)] = true;

        while let Some(current) = queue.pop_front() {
            group.push(current);
            for neighbor in self.neighbors(&current) {
                let offset = self.offset(neighbor.x, neighbor.y);
                if neighbor.color == origin.color && !visited[offset] {
                    visited[offset] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        group
    }

    /// Number of distinct empty intersections adjacent to `group`.
    pub fn liberties(&self, group: &[Stone]) -> usize {
        let mut seen = vec![false; self.stones.len()];
        let mut count = 0;
        for stone in group {
            for neighbor in self.neighbors(stone) {
                let offset = self.offset(neighbor.x, neighbor.y);
                if neighbor.is_empty() && !seen[offset] {
                    seen[offset] = true;
                    count += 1;
                }
            }
        }
        count
    }

    fn has_liberty(&self, group: &[Stone]) -> bool {
        group
            .iter()
            .any(|stone| self.neighbors(stone).iter().any(Stone::is_empty))
    }

    /// Places a stone of `color` at `(x, y)` and resolves captures.
    ///
    /// # Errors
    ///
    /// * [`RuleError::OutOfRange`] - coordinate outside the grid
    /// * [`RuleError::OccupiedCell`] - intersection not empty
    /// * [`RuleError::SuicideMove`] - the new group has no liberty and nothing was captured
    /// * [`RuleError::KoViolation`] - the result equals the position before the previous move
    /// * [`RuleError::InvalidColor`] - `color` is `Empty`
    pub fn place_stone(&mut self, x: i64, y: i64, color: Color) -> Result<MoveOutcome, RuleError> {
        let slot = color.slot().ok_or(RuleError::InvalidColor)?;
        let offset = self.index(x, y)?;
        let target = self.stones[offset];
        if !target.is_empty() {
            return Err(RuleError::OccupiedCell { x: target.x, y: target.y });
        }

        let before = self.stones.clone();
        self.stones[offset].color = color;
        let placed = self.stones[offset];

        let mut captured = Vec::new();
        for neighbor in self.neighbors(&placed) {
            // a previous neighbor may already have taken this group off the board
            let current = self.stones[self.offset(neighbor.x, neighbor.y)];
            if current.color != color.opponent() {
                continue;
            }
            let group = self.group(&current);
            if !self.has_liberty(&group) {
                for stone in &group {
                    let offset = self.offset(stone.x, stone.y);
                    self.stones[offset].color = Color::Empty;
                }
                captured.extend(group);
            }
        }

        if captured.is_empty() && !self.has_liberty(&self.group(&placed)) {
            self.stones = before;
            return Err(RuleError::SuicideMove { x: placed.x, y: placed.y });
        }

        if self.is_ko_violation() {
            self.stones = before;
            return Err(RuleError::KoViolation { x: placed.x, y: placed.y });
        }

        self.previous = Some(before);
        self.captures[slot] += captured.len() as u32;
        self.ko_candidate = match captured.as_slice() {
            [single] => Some((single.x, single.y, color.opponent())),
            _ => None,
        };

        trace!(
            "{} at ({}, {}) captured {} stone(s)",
            color,
            placed.x,
            placed.y,
            captured.len()
        );

        Ok(MoveOutcome { placed, captured })
    }

    /// Records a pass. The position before the pass becomes the ko snapshot,
    /// which lifts any pending ko restriction.
    pub fn pass(&mut self) {
        self.previous = Some(self.stones.clone());
        self.ko_candidate = None;
    }

    /// Whether the current grid equals the position before the previous move.
    pub fn is_ko_violation(&self) -> bool {
        self.previous.as_deref() == Some(self.stones.as_slice())
    }

    /// The intersection the next player may not play because of ko, if any.
    pub fn ko_point(&self) -> Option<(usize, usize)> {
        let (x, y, barred) = self.ko_candidate?;
        let mut trial = self.clone();
        match trial.place_stone(x as i64, y as i64, barred) {
            Err(RuleError::KoViolation { .. }) => Some((x, y)),
            _ => None,
        }
    }

    /// Overwrites one intersection without applying any rule.
    pub(crate) fn set_color(&mut self, x: usize, y: usize, color: Color) {
        let offset = self.offset(x, y);
        self.stones[offset].color = color;
    }

    fn index(&self, x: i64, y: i64) -> Result<usize, RuleError> {
        if !self.is_valid_coordinate(x, y) {
            return Err(RuleError::OutOfRange { x, y });
        }
        Ok(self.offset(x as usize, y as usize))
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }
}
