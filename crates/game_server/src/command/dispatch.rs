//! Command handlers, response delivery, game start and settlement.
//!
//! Each [`Verb`] maps to one handler with the same shape:
//! `(player, command) -> Result<Response, GameError>`. The [`Dispatcher`]
//! runs the handler, delivers its [`Response`], then performs the follow-up
//! steps every command shares: starting a session once both seats are
//! filled, and settling a session once its game has ended.

use crate::command::interpreter::{Command, Verb};
use crate::config::GameSettings;
use crate::connection::PlayerHandle;
use crate::error::GameError;
use crate::rating::RatingService;
use crate::session::{seat_color, SessionKind, SessionRegistry, SharedSession};
use crate::store::{GameRecord, GameStore};
use go_logic::{ScoreRule, LIVE_SEPARATOR, REPLAY_SEPARATOR};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Who receives a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Only the invoking connection
    Send,
    /// Every connected seat of the session
    Broadcast,
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub delivery: Delivery,
    pub kind: SessionKind,
    pub session: u32,
    pub payload: String,
}

impl Response {
    pub fn send(kind: SessionKind, session: u32, payload: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::Send,
            kind,
            session,
            payload: payload.into(),
        }
    }

    pub fn broadcast(kind: SessionKind, session: u32, payload: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::Broadcast,
            kind,
            session,
            payload: payload.into(),
        }
    }

    /// Text put on the wire: `<sessionId>/<payload>`.
    pub fn frame_text(&self) -> String {
        format!("{}/{}", self.session, self.payload)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delivery = match self.delivery {
            Delivery::Send => "Send",
            Delivery::Broadcast => "Broadcast",
        };
        write!(f, "{}_{}/{}", delivery, self.session, self.payload)
    }
}

/// Routes commands from every connection to the sessions they address.
///
/// Cheap to clone; clones share the registry, the store and the rating service.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn GameStore>,
    ratings: RatingService,
    settings: GameSettings,
}

impl Dispatcher {
    /// Creates a dispatcher over an existing registry and store.
    ///
    /// # Arguments
    ///
    /// * `registry` - Sessions shared with the rest of the server
    /// * `store` - Persistence collaborator for users, games and ratings
    /// * `settings` - Clock length and allowed board sizes
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn GameStore>, settings: GameSettings) -> Self {
        Self {
            registry,
            ratings: RatingService::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one plaintext message from a connection.
    ///
    /// Failures are reported to the invoking connection only, as
    /// `<id>/Error:<Kind>:<detail>`; the connection stays usable.
    pub async fn dispatch(&self, player: &PlayerHandle, text: &str) {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(err) => {
                warn!("Rejected message from {}: {}", player.id(), err);
                reject(player, 0, &err);
                return;
            }
        };
        debug!("{} -> {}", player.id(), command);

        match self.handle(player, &command).await {
            Ok(response) => {
                debug!("{}", response);
                let session = self.registry.get(response.kind, response.session).ok();
                self.deliver(player, session.as_ref(), &response).await;

                if let Some(session) = session {
                    self.start_if_ready(&session).await;
                    self.settle(&session).await;
                }
            }
            Err(err) => {
                warn!("{} from {} refused: {}", command.verb, player.id(), err);
                reject(player, command.session, &err);
                // A refused move can still have ended the game on time.
                if let Ok(session) = self.registry.get(command.kind, command.session) {
                    self.settle(&session).await;
                }
            }
        }
    }

    /// Runs the handler for a command without delivering anything.
    pub async fn handle(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        match command.verb {
            Verb::Create => self.handle_create(player, command).await,
            Verb::Join => self.handle_join(player, command).await,
            Verb::Place => self.handle_place(player, command).await,
            Verb::Skip => self.handle_skip(player, command).await,
            Verb::Resign => self.handle_resign(player, command).await,
            Verb::Timeout => self.handle_timeout(player, command).await,
            Verb::Disconnect => self.handle_disconnect(player, command).await,
            Verb::States => self.handle_states(player, command).await,
        }
    }

    async fn handle_create(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let token = command.field(0, "token")?;
        let size: usize = command.parse_field(1, "size")?;
        let rule: ScoreRule = command.parse_field(2, "rule")?;
        if !self.settings.allows_size(size) {
            return Err(GameError::InvalidCommand(format!(
                "board size {size} is not offered"
            )));
        }
        let user = self.store.get_user_by_token(token).await?;

        if command.kind == SessionKind::Matchmaking {
            while let Some((id, session)) = self
                .registry
                .find_open_matchmaking(size, rule, player.id())
                .await
            {
                match session.lock().await.add_player(player.clone(), user.clone()) {
                    Ok(_) => {
                        info!("🤝 {} paired into matchmaking session {}", user.name, id);
                        return Ok(Response::send(command.kind, id, "Created:matchmaking"));
                    }
                    // Someone else took the seat between lookup and lock.
                    Err(GameError::SessionFull(_)) | Err(GameError::AlreadyStarted) => continue,
                    Err(err) => return Err(err),
                }
            }
        }

        let (id, session) = self.registry.create(command.kind, size, rule)?;
        session.lock().await.add_player(player.clone(), user.clone())?;
        info!("🆕 {} created {} session {} ({}x{}, {})", user.name, command.kind, id, size, size, rule);
        Ok(Response::send(command.kind, id, format!("Created:{}", command.kind)))
    }

    async fn handle_join(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let token = command.field(0, "token")?;
        let session = self.registry.get(command.kind, command.session)?;
        let user = self.store.get_user_by_token(token).await?;

        session.lock().await.add_player(player.clone(), user.clone())?;
        info!("🚪 {} joined {} session {}", user.name, command.kind, command.session);
        Ok(Response::send(command.kind, command.session, "Joined"))
    }

    async fn handle_place(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let x: i64 = command.parse_field(0, "x")?;
        let y: i64 = command.parse_field(1, "y")?;
        let session = self.registry.get(command.kind, command.session)?;

        let mut guard = session.lock().await;
        let now = Instant::now();
        if let Some(color) = guard.expire_if_due_at(now) {
            return Ok(Response::broadcast(command.kind, command.session, format!("Timeout:{color}")));
        }
        let remaining = guard.place_stone_at(player.id(), x, y, now)?;
        let (live, replay) = (guard.snapshot(LIVE_SEPARATOR), guard.snapshot(REPLAY_SEPARATOR));
        let (record_id, epoch, wait) = (guard.record_id(), guard.epoch(), guard.time_left_for_current_at(now));
        let finished = guard.is_finished();
        drop(guard);

        self.record_state(record_id, &replay).await;
        if !finished {
            self.arm_watchdog(session, epoch, wait);
        }
        Ok(Response::broadcast(
            command.kind,
            command.session,
            format!("Move:{}{}{}", remaining.as_millis(), LIVE_SEPARATOR, live),
        ))
    }

    async fn handle_skip(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let session = self.registry.get(command.kind, command.session)?;

        let mut guard = session.lock().await;
        let now = Instant::now();
        if let Some(color) = guard.expire_if_due_at(now) {
            return Ok(Response::broadcast(command.kind, command.session, format!("Timeout:{color}")));
        }
        let remaining = guard.skip_turn_at(player.id(), now)?;
        let (live, replay) = (guard.snapshot(LIVE_SEPARATOR), guard.snapshot(REPLAY_SEPARATOR));
        let (record_id, epoch, wait) = (guard.record_id(), guard.epoch(), guard.time_left_for_current_at(now));
        let finished = guard.is_finished();
        drop(guard);

        self.record_state(record_id, &replay).await;
        if !finished {
            self.arm_watchdog(session, epoch, wait);
        }
        Ok(Response::broadcast(
            command.kind,
            command.session,
            format!("Skip:{}{}{}", remaining.as_millis(), LIVE_SEPARATOR, live),
        ))
    }

    async fn handle_resign(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let session = self.registry.get(command.kind, command.session)?;
        let color = session.lock().await.resign(player.id())?;
        info!("🏳️ {} resigned in {} session {}", color, command.kind, command.session);
        Ok(Response::broadcast(command.kind, command.session, format!("Resign:{color}")))
    }

    async fn handle_timeout(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let session = self.registry.get(command.kind, command.session)?;
        let color = session.lock().await.time_out(player.id())?;
        info!("⏰ {} ran out of time in {} session {}", color, command.kind, command.session);
        Ok(Response::broadcast(command.kind, command.session, format!("Timeout:{color}")))
    }

    async fn handle_disconnect(&self, player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let session = self.registry.get(command.kind, command.session)?;
        self.leave(player, &session).await?;
        Ok(Response::send(command.kind, command.session, "Left"))
    }

    async fn handle_states(&self, _player: &PlayerHandle, command: &Command) -> Result<Response, GameError> {
        let session = self.registry.get(command.kind, command.session)?;
        let record_id = session.lock().await.record_id();
        let states = self.store.get_game_states_by_id(record_id).await?;

        let mut payload = String::from("States");
        for state in states {
            payload.push_str(LIVE_SEPARATOR);
            payload.push_str(&state);
        }
        Ok(Response::send(command.kind, command.session, payload))
    }

    /// Detaches `player` from every session it is seated in. Called when the
    /// connection closes.
    pub async fn release(&self, player: &PlayerHandle) {
        for session in self.registry.sessions_with(player.id()).await {
            if let Err(err) = self.leave(player, &session).await {
                warn!("Failed to release {}: {}", player.id(), err);
            }
        }
    }

    // Frees the seat, tells the opponent and settles a forfeited game.
    async fn leave(&self, player: &PlayerHandle, session: &SharedSession) -> Result<(), GameError> {
        let mut guard = session.lock().await;
        let id = guard.id();
        let release = guard
            .release_connection(player.id())
            .ok_or(GameError::NotSeated(id))?;

        let opponent = release.seat ^ 1;
        if let Some(handle) = guard.handle(opponent) {
            handle.send_text(format!("{id}/OpponentLeft"));
        }
        info!("👋 Connection {} left {} session {} (forfeit: {})", player.id(), guard.kind(), id, release.forfeited);
        drop(guard);

        if release.forfeited {
            self.settle(session).await;
        }
        Ok(())
    }

    async fn deliver(&self, player: &PlayerHandle, session: Option<&SharedSession>, response: &Response) {
        let text = response.frame_text();
        match (response.delivery, session) {
            (Delivery::Broadcast, Some(session)) => {
                let guard = session.lock().await;
                for (_, handle) in guard.handles() {
                    handle.send_text(text.clone());
                }
            }
            _ => {
                player.send_text(text);
            }
        }
    }

    /// Starts a full session that has not started yet: refreshes both
    /// profiles, persists the game, announces each opponent and arms the clock.
    async fn start_if_ready(&self, session: &SharedSession) {
        let mut guard = session.lock().await;
        if guard.is_started() || !guard.is_full() {
            return;
        }

        for seat in 0..2 {
            let Some(token) = guard.user(seat).map(|u| u.token.clone()) else {
                return;
            };
            match self.store.get_user_by_token(&token).await {
                Ok(fresh) => {
                    if let Some(occupied) = guard.seat_mut(seat) {
                        occupied.user = fresh;
                    }
                }
                Err(err) => warn!("Could not refresh profile {}: {}", token, err),
            }
        }

        let now = Instant::now();
        if let Err(err) = guard.start_at(self.settings.main_time, now) {
            warn!("Session {} did not start: {}", guard.id(), err);
            return;
        }

        let id = guard.id();
        for (seat, handle) in guard.handles() {
            let opponent = guard.user(seat ^ 1).map(|u| u.name.as_str()).unwrap_or_default();
            handle.send_text(format!("{id}/Start:{}:{}", opponent, seat_color(seat)));
        }

        let (Some(black), Some(white)) = (guard.user(0), guard.user(1)) else {
            return;
        };
        let record = GameRecord {
            id: guard.record_id(),
            size: guard.size(),
            rule: guard.rule(),
            black_token: black.token.clone(),
            white_token: white.token.clone(),
        };
        let initial = guard.snapshot(REPLAY_SEPARATOR);
        let (epoch, wait) = (guard.epoch(), guard.time_left_for_current_at(now));
        drop(guard);

        if let Err(err) = self.store.insert_game(&record).await {
            error!("Failed to persist game {}: {}", record.id, err);
        }
        self.record_state(record.id, &initial).await;
        self.arm_watchdog(session.clone(), epoch, wait);
    }

    /// Scores a finished game and updates both ratings, exactly once per game.
    pub async fn settle(&self, session: &SharedSession) {
        let mut guard = session.lock().await;
        if !guard.test_win() {
            return;
        }
        let Some(outcome) = guard.outcome() else {
            return;
        };
        guard.mark_settled();

        let id = guard.id();
        let (black, white) = outcome.score.seats();
        for (seat, handle) in guard.handles() {
            let (mine, theirs) = if seat == 0 { (black, white) } else { (white, black) };
            handle.send_text(format!("{id}/EndOfGame:{mine}-{theirs}|{}", seat == outcome.winner));
        }
        info!(
            "🏁 {} session {} over ({:?}): {}-{}, seat {} wins",
            guard.kind(),
            id,
            outcome.reason,
            black,
            white,
            outcome.winner + 1
        );

        let winner = guard.user(outcome.winner).cloned();
        let loser = guard.user(outcome.winner ^ 1).cloned();
        drop(guard);

        if let (Some(winner), Some(loser)) = (winner, loser) {
            if let Err(err) = self.ratings.update_ratings(&winner, &loser).await {
                error!("Rating update for session {} failed: {}", id, err);
            }
        }
    }

    async fn record_state(&self, record_id: uuid::Uuid, state: &str) {
        if let Err(err) = self.store.insert_game_state(record_id, state).await {
            warn!("Could not record state of game {}: {}", record_id, err);
        }
    }

    // Ends the game by timeout if nobody moved before the running clock ran out.
    fn arm_watchdog(&self, session: SharedSession, epoch: u64, wait: Option<Duration>) {
        let Some(wait) = wait else {
            return;
        };
        let dispatcher = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;

            let mut guard = session.lock().await;
            if guard.epoch() != epoch {
                return;
            }
            let Some(color) = guard.expire_if_due_at(Instant::now()) else {
                return;
            };
            let id = guard.id();
            info!("⏰ {} flagged in {} session {}", color, guard.kind(), id);
            for (_, handle) in guard.handles() {
                handle.send_text(format!("{id}/Timeout:{color}"));
            }
            drop(guard);

            dispatcher.settle(&session).await;
        });
    }
}

fn reject(player: &PlayerHandle, session: u32, err: &GameError) {
    player.send_text(format!("{session}/Error:{}:{}", err.kind(), err));
}
