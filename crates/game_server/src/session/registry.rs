//! Concurrent index of every session, split into the custom and matchmaking pools.

use crate::connection::ConnectionId;
use crate::error::GameError;
use crate::session::game::GameSession;
use crate::session::SessionKind;
use dashmap::DashMap;
use go_logic::ScoreRule;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A session shared between the connections seated in it and the clock watchdog.
pub type SharedSession = Arc<Mutex<GameSession>>;

#[derive(Debug)]
struct Pool {
    sessions: DashMap<u32, SharedSession>,
    next_id: AtomicU32,
}

impl Pool {
    fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }
}

/// Owns every session for the lifetime of the server. Sessions are never
/// removed; a finished game simply stops accepting moves.
#[derive(Debug)]
pub struct SessionRegistry {
    custom: Pool,
    matchmaking: Pool,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            custom: Pool::new(),
            matchmaking: Pool::new(),
        }
    }

    fn pool(&self, kind: SessionKind) -> &Pool {
        match kind {
            SessionKind::Custom => &self.custom,
            SessionKind::Matchmaking => &self.matchmaking,
        }
    }

    /// Creates an empty session with the next id of its pool.
    pub fn create(
        &self,
        kind: SessionKind,
        size: usize,
        rule: ScoreRule,
    ) -> Result<(u32, SharedSession), GameError> {
        let pool = self.pool(kind);
        let id = pool.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Mutex::new(GameSession::new(id, kind, size, rule)?));
        pool.sessions.insert(id, session.clone());
        debug!("Created {} session {}", kind, id);
        Ok((id, session))
    }

    pub fn get(&self, kind: SessionKind, id: u32) -> Result<SharedSession, GameError> {
        self.pool(kind)
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(GameError::NotFound(id))
    }

    pub fn len(&self, kind: SessionKind) -> usize {
        self.pool(kind).sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.custom.sessions.is_empty() && self.matchmaking.sessions.is_empty()
    }

    /// A matchmaking session waiting for a second player with the same board
    /// size and rule, which `connection` is not already seated in.
    ///
    /// The lowest id wins so players are paired in arrival order.
    pub async fn find_open_matchmaking(
        &self,
        size: usize,
        rule: ScoreRule,
        connection: ConnectionId,
    ) -> Option<(u32, SharedSession)> {
        let mut candidates = Self::collect(&self.matchmaking);
        candidates.sort_by_key(|(id, _)| *id);

        for (id, session) in candidates {
            let guard = session.lock().await;
            if !guard.is_started()
                && !guard.is_full()
                && guard.size() == size
                && guard.rule() == rule
                && guard.seat_of(connection).is_none()
            {
                drop(guard);
                return Some((id, session));
            }
        }
        None
    }

    /// Every session the connection currently holds a seat in.
    pub async fn sessions_with(&self, connection: ConnectionId) -> Vec<SharedSession> {
        let mut found = Vec::new();
        for pool in [&self.custom, &self.matchmaking] {
            for (_, session) in Self::collect(pool) {
                if session.lock().await.seat_of(connection).is_some() {
                    found.push(session);
                }
            }
        }
        found
    }

    // Clones the entries out so no map shard stays locked across an await.
    fn collect(pool: &Pool) -> Vec<(u32, SharedSession)> {
        pool.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
