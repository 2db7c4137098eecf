//! Elo rating updates.

use crate::store::{GameStore, StoreError, UserProfile};
use std::sync::Arc;
use tracing::info;

/// Weight of a single game on the rating.
pub const K_FACTOR: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Loss,
    Win,
}

impl MatchResult {
    fn points(self) -> f64 {
        match self {
            MatchResult::Loss => 0.0,
            MatchResult::Win => 1.0,
        }
    }
}

/// New rating of `player` after a game against `opponent`.
///
/// `expected = 1 / (1 + 10^((opponent - player) / 400))`, and the result is
/// `player + K * (result - expected)` rounded to the nearest integer.
pub fn calculate_new_elo(player: i32, opponent: i32, result: MatchResult) -> i32 {
    let expected = 1.0 / (1.0 + 10f64.powf(f64::from(opponent - player) / 400.0));
    (f64::from(player) + K_FACTOR * (result.points() - expected)).round() as i32
}

/// Commits rating changes through the [`GameStore`].
#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn GameStore>,
}

impl RatingService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Applies one finished game to both players.
    ///
    /// Both new ratings are computed from the ratings before the game, then
    /// written winner first.
    ///
    /// # Returns
    ///
    /// The new `(winner, loser)` ratings.
    pub async fn update_ratings(
        &self,
        winner: &UserProfile,
        loser: &UserProfile,
    ) -> Result<(i32, i32), StoreError> {
        let new_winner = calculate_new_elo(winner.rating, loser.rating, MatchResult::Win);
        let new_loser = calculate_new_elo(loser.rating, winner.rating, MatchResult::Loss);

        self.store
            .update_rating_by_token(&winner.token, new_winner)
            .await?;
        self.store
            .update_rating_by_token(&loser.token, new_loser)
            .await?;

        info!(
            "🏆 {} {} -> {}, {} {} -> {}",
            winner.name, winner.rating, new_winner, loser.name, loser.rating, new_loser
        );
        Ok((new_winner, new_loser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn user(token: &str, rating: i32) -> UserProfile {
        UserProfile {
            token: token.to_string(),
            name: token.to_string(),
            rating,
        }
    }

    #[test]
    fn test_even_match() {
        assert_eq!(calculate_new_elo(1500, 1500, MatchResult::Win), 1516);
        assert_eq!(calculate_new_elo(1500, 1500, MatchResult::Loss), 1484);
    }

    #[test]
    fn test_direction_of_change() {
        assert!(calculate_new_elo(1500, 1400, MatchResult::Win) > 1500);
        assert!(calculate_new_elo(1500, 1600, MatchResult::Loss) < 1500);
    }

    #[test]
    fn test_underdog_gains_more() {
        let favourite = calculate_new_elo(1800, 1400, MatchResult::Win) - 1800;
        let underdog = calculate_new_elo(1400, 1800, MatchResult::Win) - 1400;
        assert!(favourite < underdog);
        assert!(favourite >= 0);
    }

    #[tokio::test]
    async fn test_update_uses_pre_game_ratings() {
        let store = Arc::new(MemoryStore::with_users([user("w", 1500), user("l", 1500)]));
        let service = RatingService::new(store.clone());

        let (w, l) = service
            .update_ratings(&user("w", 1500), &user("l", 1500))
            .await
            .unwrap();

        assert_eq!((w, l), (1516, 1484));
        assert_eq!(
            store.rating_updates().await,
            vec![("w".to_string(), 1516), ("l".to_string(), 1484)]
        );
    }
}
