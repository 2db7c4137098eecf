//! Persistence collaborator.
//!
//! The server only needs a handful of operations from the account and game
//! database, expressed by [`GameStore`]. [`MemoryStore`] keeps everything in
//! process and is what the binary runs with.

use async_trait::async_trait;
use dashmap::DashMap;
use go_logic::ScoreRule;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors returned by a [`GameStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no user with token '{0}'")]
    NotFound(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Account data of a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub token: String,
    pub name: String,
    pub rating: i32,
}

/// A game as persisted when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub id: Uuid,
    pub size: usize,
    pub rule: ScoreRule,
    pub black_token: String,
    pub white_token: String,
}

/// Operations the session server needs from persistence.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn get_user_by_token(&self, token: &str) -> Result<UserProfile, StoreError>;

    async fn update_rating_by_token(&self, token: &str, rating: i32) -> Result<(), StoreError>;

    async fn insert_game(&self, game: &GameRecord) -> Result<(), StoreError>;

    /// Appends one serialized board state to a stored game.
    async fn insert_game_state(&self, game_id: Uuid, state: &str) -> Result<(), StoreError>;

    /// All states of a game in the order they were recorded.
    async fn get_game_states_by_id(&self, game_id: Uuid) -> Result<Vec<String>, StoreError>;
}

/// In-process [`GameStore`] seeded with a fixed set of accounts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserProfile>,
    games: DashMap<Uuid, GameRecord>,
    states: DashMap<Uuid, Vec<String>>,
    rating_log: Mutex<Vec<(String, i32)>>,
}

impl MemoryStore {
    /// Creates a store holding the given accounts, keyed by token.
    ///
    /// # Arguments
    ///
    /// * `users` - Accounts available to `Create`/`Join` commands
    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let store = Self::default();
        for user in users {
            store.users.insert(user.token.clone(), user);
        }
        info!("💾 Memory store seeded with {} user(s)", store.users.len());
        store
    }

    /// Rating updates in the order they were committed, as `(token, rating)`.
    pub async fn rating_updates(&self) -> Vec<(String, i32)> {
        self.rating_log.lock().await.clone()
    }

    pub fn game(&self, id: Uuid) -> Option<GameRecord> {
        self.games.get(&id).map(|entry| entry.value().clone())
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get_user_by_token(&self, token: &str) -> Result<UserProfile, StoreError> {
        self.users
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(token.to_string()))
    }

    async fn update_rating_by_token(&self, token: &str, rating: i32) -> Result<(), StoreError> {
        let mut user = self
            .users
            .get_mut(token)
            .ok_or_else(|| StoreError::NotFound(token.to_string()))?;
        user.rating = rating;
        drop(user);

        self.rating_log.lock().await.push((token.to_string(), rating));
        debug!("Rating of {} set to {}", token, rating);
        Ok(())
    }

    async fn insert_game(&self, game: &GameRecord) -> Result<(), StoreError> {
        self.games.insert(game.id, game.clone());
        self.states.entry(game.id).or_default();
        Ok(())
    }

    async fn insert_game_state(&self, game_id: Uuid, state: &str) -> Result<(), StoreError> {
        let mut states = self
            .states
            .get_mut(&game_id)
            .ok_or_else(|| StoreError::Backend(format!("game {game_id} was never inserted")))?;
        states.push(state.to_string());
        Ok(())
    }

    async fn get_game_states_by_id(&self, game_id: Uuid) -> Result<Vec<String>, StoreError> {
        self.states
            .get(&game_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::Backend(format!("game {game_id} was never inserted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserProfile {
        UserProfile {
            token: "tok-alice".to_string(),
            name: "alice".to_string(),
            rating: 1500,
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let store = MemoryStore::with_users([alice()]);
        assert_eq!(store.get_user_by_token("tok-alice").await.unwrap().name, "alice");
        assert_eq!(
            store.get_user_by_token("nobody").await,
            Err(StoreError::NotFound("nobody".to_string()))
        );
    }

    #[tokio::test]
    async fn test_rating_updates_are_logged_in_order() {
        let store = MemoryStore::with_users([alice()]);
        store.update_rating_by_token("tok-alice", 1516).await.unwrap();
        store.update_rating_by_token("tok-alice", 1500).await.unwrap();

        assert_eq!(store.get_user_by_token("tok-alice").await.unwrap().rating, 1500);
        assert_eq!(
            store.rating_updates().await,
            vec![("tok-alice".to_string(), 1516), ("tok-alice".to_string(), 1500)]
        );
        assert!(store.update_rating_by_token("ghost", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_states_follow_their_game() {
        let store = MemoryStore::default();
        let record = GameRecord {
            id: Uuid::new_v4(),
            size: 9,
            rule: ScoreRule::Area,
            black_token: "a".to_string(),
            white_token: "b".to_string(),
        };

        assert!(store.insert_game_state(record.id, "x").await.is_err());
        store.insert_game(&record).await.unwrap();
        store.insert_game_state(record.id, "first").await.unwrap();
        store.insert_game_state(record.id, "second").await.unwrap();

        assert_eq!(store.game_count(), 1);
        assert_eq!(store.game(record.id), Some(record.clone()));
        assert_eq!(
            store.get_game_states_by_id(record.id).await.unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }
}
