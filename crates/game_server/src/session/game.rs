//! A single two-player match.

use crate::connection::{ConnectionId, PlayerHandle};
use crate::error::GameError;
use crate::session::SessionKind;
use crate::store::UserProfile;
use go_logic::{BoardSnapshot, Color, EndReason, GameLogic, Score, ScoreRule, TimerManager};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// An occupied seat. The user stays after the connection leaves so the game
/// can still be settled.
#[derive(Debug, Clone)]
pub struct Seat {
    pub handle: Option<PlayerHandle>,
    pub user: UserProfile,
}

/// Result of a finished game, from the first seat's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub score: Score,
    /// Seat index (0 or 1) of the winner
    pub winner: usize,
    pub reason: EndReason,
}

/// What happened when a connection was released from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub seat: usize,
    /// The departure ended a running game
    pub forfeited: bool,
}

/// Seat 0 plays black and moves first, seat 1 plays white.
pub fn seat_color(seat: usize) -> Color {
    if seat == 0 {
        Color::Black
    } else {
        Color::White
    }
}

/// Authoritative state of one match.
///
/// Every method is synchronous; callers hold the session's mutex for the whole
/// operation so moves never interleave.
#[derive(Debug)]
pub struct GameSession {
    id: u32,
    kind: SessionKind,
    size: usize,
    rule: ScoreRule,
    logic: GameLogic,
    seats: [Option<Seat>; 2],
    turn: usize,
    started: bool,
    timers: Option<TimerManager>,
    settled: bool,
    epoch: u64,
    record_id: Uuid,
}

impl GameSession {
    pub fn new(id: u32, kind: SessionKind, size: usize, rule: ScoreRule) -> Result<Self, GameError> {
        Ok(Self {
            id,
            kind,
            size,
            rule,
            logic: GameLogic::new(size)?,
            seats: [None, None],
            turn: 0,
            started: false,
            timers: None,
            settled: false,
            epoch: 0,
            record_id: Uuid::new_v4(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn rule(&self) -> ScoreRule {
        self.rule
    }

    /// Key of this game in the store.
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn logic(&self) -> &GameLogic {
        &self.logic
    }

    /// Seats a player in the first empty seat.
    ///
    /// # Returns
    ///
    /// The seat index the player got.
    pub fn add_player(&mut self, handle: PlayerHandle, user: UserProfile) -> Result<usize, GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        if self.seat_of(handle.id()).is_some() {
            return Err(GameError::InvalidCommand(format!(
                "already seated in session {}",
                self.id
            )));
        }
        let seat = self
            .seats
            .iter()
            .position(Option::is_none)
            .ok_or(GameError::SessionFull(self.id))?;

        debug!("Session {} seat {} taken by {}", self.id, seat, user.name);
        self.seats[seat] = Some(Seat {
            handle: Some(handle),
            user,
        });
        Ok(seat)
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.logic.is_end_game()
    }

    pub fn start(&mut self, main_time: Duration) -> Result<(), GameError> {
        self.start_at(main_time, Instant::now())
    }

    /// Starts the game and the first player's clock. Only a full session can
    /// start, and only once.
    pub fn start_at(&mut self, main_time: Duration, now: Instant) -> Result<(), GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        if !self.is_full() {
            return Err(GameError::InvalidCommand(format!(
                "session {} is waiting for a second player",
                self.id
            )));
        }

        let mut timers = TimerManager::new(main_time);
        timers.start_at(now);
        self.timers = Some(timers);
        self.started = true;
        self.turn = 0;
        self.epoch += 1;
        info!("🎮 Session {} ({}) started on {}x{}", self.id, self.kind, self.size, self.size);
        Ok(())
    }

    pub fn seat(&self, seat: usize) -> Option<&Seat> {
        self.seats.get(seat).and_then(Option::as_ref)
    }

    pub fn seat_mut(&mut self, seat: usize) -> Option<&mut Seat> {
        self.seats.get_mut(seat).and_then(Option::as_mut)
    }

    pub fn user(&self, seat: usize) -> Option<&UserProfile> {
        self.seat(seat).map(|s| &s.user)
    }

    pub fn handle(&self, seat: usize) -> Option<&PlayerHandle> {
        self.seat(seat).and_then(|s| s.handle.as_ref())
    }

    /// Connected handles with their seat index.
    pub fn handles(&self) -> impl Iterator<Item = (usize, &PlayerHandle)> {
        (0..2).filter_map(move |seat| self.handle(seat).map(|h| (seat, h)))
    }

    pub fn seat_of(&self, connection: ConnectionId) -> Option<usize> {
        self.handles()
            .find(|(_, handle)| handle.id() == connection)
            .map(|(seat, _)| seat)
    }

    /// Seat index expected to move.
    pub fn current_seat(&self) -> usize {
        self.turn
    }

    pub fn change_turn(&mut self) {
        self.turn ^= 1;
    }

    /// Counter bumped on every accepted move; stale clock watchdogs compare against it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn place_stone(&mut self, connection: ConnectionId, x: i64, y: i64) -> Result<Duration, GameError> {
        self.place_stone_at(connection, x, y, Instant::now())
    }

    /// Plays a stone for the invoking seat.
    ///
    /// The clocks are switched before the rules are consulted and switched
    /// back if the move is refused.
    ///
    /// # Returns
    ///
    /// Remaining time of the player who just moved.
    pub fn place_stone_at(
        &mut self,
        connection: ConnectionId,
        x: i64,
        y: i64,
        now: Instant,
    ) -> Result<Duration, GameError> {
        self.ensure_turn(connection)?;
        let timers = self.timers.as_mut().ok_or(GameError::NotStarted)?;

        timers.switch_to_next_player_at(now);
        if let Err(err) = self.logic.place_stone(x, y) {
            timers.rollback_switch_at(now);
            return Err(err.into());
        }
        let remaining = timers.previous_clock().remaining_at(now);

        self.change_turn();
        self.epoch += 1;
        Ok(remaining)
    }

    pub fn skip_turn(&mut self, connection: ConnectionId) -> Result<Duration, GameError> {
        self.skip_turn_at(connection, Instant::now())
    }

    /// Passes for the invoking seat. The second consecutive pass ends the game.
    pub fn skip_turn_at(&mut self, connection: ConnectionId, now: Instant) -> Result<Duration, GameError> {
        self.ensure_turn(connection)?;
        let timers = self.timers.as_mut().ok_or(GameError::NotStarted)?;

        timers.switch_to_next_player_at(now);
        if let Err(err) = self.logic.skip_turn() {
            timers.rollback_switch_at(now);
            return Err(err.into());
        }
        let remaining = timers.previous_clock().remaining_at(now);
        if self.logic.is_end_game() {
            timers.stop_at(now);
        }

        self.change_turn();
        self.epoch += 1;
        Ok(remaining)
    }

    /// The invoking seat gives up.
    pub fn resign(&mut self, connection: ConnectionId) -> Result<Color, GameError> {
        let seat = self.seat_of(connection).ok_or(GameError::NotSeated(self.id))?;
        if !self.started {
            return Err(GameError::NotStarted);
        }
        let color = seat_color(seat);
        self.logic.resign(color)?;
        self.stop_clocks(Instant::now());
        Ok(color)
    }

    pub fn time_out(&mut self, connection: ConnectionId) -> Result<Color, GameError> {
        self.time_out_at(connection, Instant::now())
    }

    /// Declares the running clock expired.
    ///
    /// The player on turn may always declare their own clock out; the opponent
    /// only once it has actually reached zero.
    pub fn time_out_at(&mut self, connection: ConnectionId, now: Instant) -> Result<Color, GameError> {
        let seat = self.seat_of(connection).ok_or(GameError::NotSeated(self.id))?;
        let timers = self.timers.as_ref().ok_or(GameError::NotStarted)?;
        if seat != self.turn && !timers.current_expired_at(now) {
            return Err(GameError::InvalidCommand(
                "the opponent's clock has not run out".to_string(),
            ));
        }

        let color = seat_color(self.turn);
        self.logic.time_out(color)?;
        self.stop_clocks(now);
        Ok(color)
    }

    /// Ends the game by timeout if the running clock has reached zero.
    ///
    /// # Returns
    ///
    /// The color that ran out of time, if the game ended here.
    pub fn expire_if_due_at(&mut self, now: Instant) -> Option<Color> {
        let expired = self
            .timers
            .as_ref()
            .map(|timers| timers.current_expired_at(now))
            .unwrap_or(false);
        if !expired || self.logic.is_end_game() {
            return None;
        }

        let color = seat_color(self.turn);
        self.logic.time_out(color).ok()?;
        self.stop_clocks(now);
        Some(color)
    }

    /// Time left on the running clock, once the game has started.
    pub fn time_left_for_current_at(&self, now: Instant) -> Option<Duration> {
        self.timers
            .as_ref()
            .map(|timers| timers.current_clock().remaining_at(now))
    }

    /// Detaches a connection from its seat.
    ///
    /// Before the start the seat is freed for someone else. During a running
    /// game the player forfeits and their profile stays for settlement.
    pub fn release_connection(&mut self, connection: ConnectionId) -> Option<Release> {
        let seat = self.seat_of(connection)?;

        if !self.started {
            self.seats[seat] = None;
            return Some(Release {
                seat,
                forfeited: false,
            });
        }

        if let Some(occupied) = self.seats[seat].as_mut() {
            occupied.handle = None;
        }
        let forfeited = !self.logic.is_end_game() && self.logic.abandon(seat_color(seat)).is_ok();
        if forfeited {
            self.stop_clocks(Instant::now());
        }
        Some(Release { seat, forfeited })
    }

    /// Serialized board with the given line separator.
    pub fn snapshot(&self, separator: &str) -> String {
        BoardSnapshot::capture(&self.logic).encode(separator)
    }

    pub fn score(&self) -> Score {
        self.rule.calculate(self.logic.board())
    }

    /// Whether the game has ended and still needs settling.
    pub fn test_win(&self) -> bool {
        self.logic.is_end_game() && !self.settled
    }

    /// Final result once the game is over. A forfeit hands the win to the
    /// other seat; otherwise the first seat wins ties.
    pub fn outcome(&self) -> Option<Outcome> {
        let reason = self.logic.end_reason()?;
        let score = self.score();
        let winner = match reason.forfeited_by() {
            Some(Color::Black) => 1,
            Some(_) => 0,
            None if score.black >= score.white => 0,
            None => 1,
        };
        Some(Outcome {
            score,
            winner,
            reason,
        })
    }

    /// Flags the game as settled. Returns `true` only for the first call.
    pub fn mark_settled(&mut self) -> bool {
        if self.settled {
            return false;
        }
        self.settled = true;
        true
    }

    fn ensure_turn(&self, connection: ConnectionId) -> Result<usize, GameError> {
        let seat = self.seat_of(connection).ok_or(GameError::NotSeated(self.id))?;
        if !self.started {
            return Err(GameError::NotStarted);
        }
        if self.logic.is_end_game() {
            return Err(GameError::Rule(go_logic::RuleError::GameOver));
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        Ok(seat)
    }

    fn stop_clocks(&mut self, now: Instant) {
        if let Some(timers) = self.timers.as_mut() {
            timers.stop_at(now);
        }
    }
}
