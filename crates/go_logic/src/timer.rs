//! Per-player countdown clocks.
//!
//! Clocks are driven by explicit `Instant`s so they can be stepped in tests;
//! the methods without an `_at` suffix read `Instant::now()`.

use std::time::{Duration, Instant};

/// A single countdown clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    remaining: Duration,
    running_since: Option<Instant>,
}

impl Clock {
    pub fn new(main_time: Duration) -> Self {
        Self {
            remaining: main_time,
            running_since: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Stops the clock and charges the time it ran. Returns the charged time.
    pub fn stop_at(&mut self, now: Instant) -> Duration {
        match self.running_since.take() {
            Some(since) => {
                let elapsed = now.saturating_duration_since(since);
                self.remaining = self.remaining.saturating_sub(elapsed);
                elapsed
            }
            None => Duration::ZERO,
        }
    }

    /// Stops the clock without charging anything.
    pub fn cancel(&mut self) {
        self.running_since = None;
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self
                .remaining
                .saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.remaining_at(now).is_zero()
    }
}

/// The two clocks of a game, one per seat; exactly one runs at a time.
///
/// Seat 0 (black) starts. Every move attempt calls
/// [`switch_to_next_player`](Self::switch_to_next_player) before the move is
/// validated, so the thinking time is charged to the mover; a refused move is
/// undone with [`rollback_switch`](Self::rollback_switch).
#[derive(Debug, Clone)]
pub struct TimerManager {
    clocks: [Clock; 2],
    current: usize,
}

impl TimerManager {
    pub fn new(main_time: Duration) -> Self {
        Self {
            clocks: [Clock::new(main_time), Clock::new(main_time)],
            current: 0,
        }
    }

    /// Starts the first seat's clock.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.current = 0;
        self.clocks[0].start_at(now);
    }

    pub fn switch_to_next_player(&mut self) {
        self.switch_to_next_player_at(Instant::now());
    }

    pub fn switch_to_next_player_at(&mut self, now: Instant) {
        self.clocks[self.current].stop_at(now);
        self.current ^= 1;
        self.clocks[self.current].start_at(now);
    }

    pub fn rollback_switch(&mut self) {
        self.rollback_switch_at(Instant::now());
    }

    /// Gives the turn back to the previous mover. Time already charged to
    /// them stays charged.
    pub fn rollback_switch_at(&mut self, now: Instant) {
        self.clocks[self.current].cancel();
        self.current ^= 1;
        self.clocks[self.current].start_at(now);
    }

    /// Clock of the player who just finished their turn.
    pub fn previous_clock(&self) -> &Clock {
        &self.clocks[self.current ^ 1]
    }

    /// Clock of the player on turn.
    pub fn current_clock(&self) -> &Clock {
        &self.clocks[self.current]
    }

    /// Seat index (0 or 1) whose clock is running.
    pub fn current_seat(&self) -> usize {
        self.current
    }

    pub fn clock(&self, seat: usize) -> &Clock {
        &self.clocks[seat]
    }

    pub fn time_left_for_current(&self) -> Duration {
        self.current_clock().remaining()
    }

    pub fn current_expired_at(&self, now: Instant) -> bool {
        self.current_clock().is_expired_at(now)
    }

    pub fn current_expired(&self) -> bool {
        self.current_expired_at(Instant::now())
    }

    /// Stops both clocks, charging the one that was running.
    pub fn stop_at(&mut self, now: Instant) {
        self.clocks[self.current].stop_at(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: Duration = Duration::from_secs(600);

    #[test]
    fn test_clock_charges_only_while_running() {
        let t0 = Instant::now();
        let mut clock = Clock::new(MAIN);
        assert_eq!(clock.remaining_at(t0 + Duration::from_secs(5)), MAIN);

        clock.start_at(t0);
        assert_eq!(clock.stop_at(t0 + Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(clock.remaining_at(t0 + Duration::from_secs(50)), Duration::from_secs(595));
    }

    #[test]
    fn test_clock_expires_at_zero() {
        let t0 = Instant::now();
        let mut clock = Clock::new(Duration::from_secs(1));
        clock.start_at(t0);
        assert!(!clock.is_expired_at(t0 + Duration::from_millis(999)));
        assert!(clock.is_expired_at(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_switch_charges_the_mover() {
        let t0 = Instant::now();
        let mut timers = TimerManager::new(MAIN);
        timers.start_at(t0);
        assert_eq!(timers.current_seat(), 0);

        timers.switch_to_next_player_at(t0 + Duration::from_secs(7));
        assert_eq!(timers.current_seat(), 1);
        assert_eq!(timers.previous_clock().remaining_at(t0), Duration::from_secs(593));
        assert!(timers.current_clock().is_running());
        assert!(!timers.previous_clock().is_running());

        timers.switch_to_next_player_at(t0 + Duration::from_secs(10));
        assert_eq!(timers.current_seat(), 0);
        assert_eq!(timers.previous_clock().remaining_at(t0), Duration::from_secs(597));
    }

    #[test]
    fn test_rollback_returns_turn_without_charging_opponent() {
        let t0 = Instant::now();
        let mut timers = TimerManager::new(MAIN);
        timers.start_at(t0);
        timers.switch_to_next_player_at(t0 + Duration::from_secs(4));
        timers.rollback_switch_at(t0 + Duration::from_secs(4));

        assert_eq!(timers.current_seat(), 0);
        assert_eq!(timers.clock(1).remaining_at(t0 + Duration::from_secs(60)), MAIN);
        assert_eq!(
            timers.clock(0).remaining_at(t0 + Duration::from_secs(6)),
            Duration::from_secs(594)
        );
    }
}
