use crate::persistence::PersistenceBridge;
use crate::websocket::connection::ConnectionManager;
use dashmap::DashMap;
use quiz_core::{AdvanceOutcome, JoinOutcome, OfflineOutcome, Room, now_ms, project};
use quiz_types::{ConnectionId, GamePhase, RoomError, RoomSettings, ServerMessage};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// Cancellation handle for a pending timer task. Dropping the sender
/// also cancels, but explicit cancel keeps intent visible at call sites.
struct TimerHandle {
    cancel: watch::Sender<bool>,
}

impl TimerHandle {
    fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// A room plus its server-side runtime state. The per-room mutex
/// serializes all mutation; timers and handlers alike must hold it.
pub(crate) struct ActiveRoom {
    pub room: Room,
    question_timer: Option<TimerHandle>,
    auto_next_timer: Option<TimerHandle>,
    last_activity: Instant,
}

impl ActiveRoom {
    fn new(room: Room) -> Self {
        Self {
            room,
            question_timer: None,
            auto_next_timer: None,
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    fn cancel_question_timer(&mut self) {
        if let Some(timer) = self.question_timer.take() {
            timer.cancel();
        }
    }

    fn cancel_auto_next_timer(&mut self) {
        if let Some(timer) = self.auto_next_timer.take() {
            timer.cancel();
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel_question_timer();
        self.cancel_auto_next_timer();
    }
}

/// Owns every live room, the connection-to-room index used on
/// disconnect, and the timers that drive round progression.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, Arc<Mutex<ActiveRoom>>>>,
    connection_rooms: DashMap<ConnectionId, String>,
    connections: Arc<ConnectionManager>,
    bridge: Arc<PersistenceBridge>,
    auto_next_delay: Duration,
}

impl RoomManager {
    pub fn new(
        connections: Arc<ConnectionManager>,
        bridge: Arc<PersistenceBridge>,
        auto_next_delay: Duration,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connection_rooms: DashMap::new(),
            connections,
            bridge,
            auto_next_delay,
        }
    }

    pub async fn active_room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn generate_join_code(&self) -> String {
        loop {
            let code = format!("{:06}", rand::rng().random_range(0..1_000_000));
            if !self.rooms.read().await.contains_key(&code) {
                return code;
            }
        }
    }

    /// Looks up a live room, falling back to the durable mirror. A
    /// recovered room comes back with every participant offline and no
    /// timers armed; reconnects bring it back to life.
    async fn room_entry(&self, join_code: &str) -> Result<Arc<Mutex<ActiveRoom>>, RoomError> {
        if let Some(entry) = self.rooms.read().await.get(join_code) {
            return Ok(entry.clone());
        }

        let Some(room) = self.bridge.load_mirror(join_code).await else {
            return Err(RoomError::RoomNotFound);
        };
        info!("Recovered room {} from its durable mirror", join_code);

        let mut rooms = self.rooms.write().await;
        // Another task may have recovered the same room while we read
        // the mirror; the first insert wins.
        let entry = rooms
            .entry(join_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ActiveRoom::new(room))))
            .clone();
        Ok(entry)
    }

    async fn broadcast(&self, join_code: &str, room: &Room) {
        let targets = project(room, join_code)
            .into_iter()
            .map(|(connection, snapshot)| (connection, ServerMessage::GameUpdate(snapshot)))
            .collect();
        self.connections.send_to_each(targets).await;
    }

    /// Write-through of room state to the durable mirror, off the hot
    /// path. Mirror staleness on crash is bounded by one mutation. The
    /// write re-checks that the room is still live so a mutation racing
    /// a close never resurrects the mirror row the close just deleted.
    fn spawn_mirror_write(self: &Arc<Self>, join_code: &str, room: &Room) {
        let manager = self.clone();
        let join_code = join_code.to_string();
        let room = room.clone();
        tokio::spawn(async move {
            if !manager.rooms.read().await.contains_key(&join_code) {
                return;
            }
            manager.bridge.save_mirror(&join_code, &room).await;
        });
    }

    pub async fn create_room(
        self: &Arc<Self>,
        connection: ConnectionId,
        quiz_id: String,
        host_id: String,
        host_name: String,
        team_id: Option<String>,
        settings: RoomSettings,
    ) -> Result<String, RoomError> {
        let join_code = self.generate_join_code().await;
        let room = Room::new(
            Uuid::new_v4(),
            quiz_id,
            host_id,
            host_name,
            team_id,
            settings,
            connection,
        );

        {
            let bridge = self.bridge.clone();
            let record = room.clone();
            let code = join_code.clone();
            tokio::spawn(async move {
                bridge.record_session_created(&record, &code).await;
            });
        }

        self.rooms
            .write()
            .await
            .insert(join_code.clone(), Arc::new(Mutex::new(ActiveRoom::new(room.clone()))));
        self.connection_rooms.insert(connection, join_code.clone());

        info!("Created room {} (session {})", join_code, room.session_id);
        self.broadcast(&join_code, &room).await;
        self.spawn_mirror_write(&join_code, &room);
        Ok(join_code)
    }

    pub async fn join_room(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
        user_id: String,
        username: String,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;

        // Membership lookup happens outside the room lock.
        let team_id = entry.lock().await.room.team_id.clone();
        let is_member = match &team_id {
            Some(team_id) => self.bridge.is_team_member(team_id, &user_id).await,
            None => true,
        };

        let mut active = entry.lock().await;
        active.touch();
        let outcome = active
            .room
            .join(user_id.clone(), username, connection, is_member)?;
        self.connection_rooms.insert(connection, join_code.to_string());

        match outcome {
            JoinOutcome::Joined => {
                info!("{} joined room {}", user_id, join_code);
            }
            JoinOutcome::Rejoined { resume } => {
                info!("{} reconnected to room {}", user_id, join_code);
                if let Some(selection) = resume {
                    let _ = self
                        .connections
                        .send_to_connection(
                            connection,
                            ServerMessage::YourSelected {
                                option: selection.option,
                                question_no: selection.question_no,
                            },
                        )
                        .await;
                }
            }
        }

        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(())
    }

    pub async fn update_settings(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
        settings: RoomSettings,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;
        let mut active = entry.lock().await;
        active.touch();
        let caller = Self::caller_identity(&active.room, connection)?;
        active.room.update_settings(&caller, settings)?;
        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(())
    }

    pub async fn start_game(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;

        // The quiz fetch awaits the store, so it runs before the room
        // lock is taken.
        let (quiz_id, caller) = {
            let active = entry.lock().await;
            (
                active.room.quiz_id.clone(),
                Self::caller_identity(&active.room, connection)?,
            )
        };
        let questions = match self.bridge.find_quiz(&quiz_id).await {
            Ok(Some(quiz)) => quiz.questions,
            Ok(None) => return Err(RoomError::QuizHasNoQuestions),
            Err(e) => {
                return Err(RoomError::PersistenceFailure {
                    message: e.to_string(),
                });
            }
        };

        let mut active = entry.lock().await;
        active.touch();
        let time_limit = active.room.start_game(&caller, questions, now_ms())?;
        info!("Room {} started its game", join_code);

        self.arm_question_timer(join_code, time_limit, &mut active);
        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(())
    }

    /// Returns true when this answer completed the round.
    pub async fn submit_answer(
        self: &Arc<Self>,
        join_code: &str,
        user_id: &str,
        option_index: usize,
    ) -> Result<bool, RoomError> {
        let entry = self.room_entry(join_code).await?;
        let mut active = entry.lock().await;
        active.touch();
        let round_complete = active.room.submit_answer(user_id, option_index, now_ms())?;
        if round_complete {
            self.complete_round(join_code, &mut active).await;
        }
        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(round_complete)
    }

    pub async fn request_next_question(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;
        let mut active = entry.lock().await;
        active.touch();
        let caller = Self::caller_identity(&active.room, connection)?;
        let outcome = active.room.advance(Some(&caller), now_ms())?;
        // The manual advance supersedes any pending auto-advance.
        active.cancel_auto_next_timer();
        self.apply_advance(join_code, &mut active, outcome).await;
        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(())
    }

    pub async fn play_again(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;
        let mut active = entry.lock().await;
        active.touch();
        let caller = Self::caller_identity(&active.room, connection)?;
        active.room.play_again(&caller)?;
        info!("Room {} returned to the lobby for a rematch", join_code);

        // The rematch reuses the same session record.
        let bridge = self.bridge.clone();
        let session_id = active.room.session_id;
        tokio::spawn(async move {
            bridge.record_session_reopened(session_id).await;
        });

        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
        Ok(())
    }

    pub async fn end_game(
        self: &Arc<Self>,
        connection: ConnectionId,
        join_code: &str,
    ) -> Result<(), RoomError> {
        let entry = self.room_entry(join_code).await?;
        {
            let active = entry.lock().await;
            let caller = Self::caller_identity(&active.room, connection)?;
            if !active.room.is_host(&caller) {
                return Err(RoomError::NotHost);
            }
        }

        self.close_room(join_code, "The host ended the game").await;
        Ok(())
    }

    /// Tears a room down: timers cancelled, everyone notified, the
    /// mirror row deleted, and the session record settled if the game
    /// never reached its end. Idempotent for already-removed rooms.
    pub async fn close_room(&self, join_code: &str, reason: &str) {
        let entry = self.rooms.write().await.remove(join_code);
        let Some(entry) = entry else {
            return;
        };

        let mut active = entry.lock().await;
        active.cancel_timers();

        // A finished game was already finalized at the end transition;
        // anything torn down earlier settles the durable record with
        // whatever standings exist, so no session row dangles as active.
        if active.room.phase != GamePhase::End {
            let bridge = self.bridge.clone();
            let session_id = active.room.session_id;
            let quiz_id = active.room.quiz_id.clone();
            let total_questions = active.room.questions.len();
            let standings = active.room.final_standings();
            tokio::spawn(async move {
                bridge
                    .finalize_game(session_id, &quiz_id, total_questions, &standings)
                    .await;
            });
        }

        let targets: Vec<_> = active
            .room
            .participants
            .iter()
            .filter(|p| p.is_online)
            .map(|p| {
                (
                    p.connection,
                    ServerMessage::RoomClosed {
                        reason: reason.to_string(),
                    },
                )
            })
            .collect();
        self.connections.send_to_each(targets).await;

        for participant in &active.room.participants {
            self.connection_rooms.remove(&participant.connection);
        }

        self.bridge.delete_mirror(join_code).await;
        info!("Closed room {}: {}", join_code, reason);
    }

    pub async fn handle_disconnect(self: &Arc<Self>, connection: ConnectionId) {
        let Some((_, join_code)) = self.connection_rooms.remove(&connection) else {
            return;
        };
        let entry = self.rooms.read().await.get(&join_code).cloned();
        let Some(entry) = entry else {
            return;
        };

        let mut active = entry.lock().await;
        match active.room.mark_offline(connection) {
            Some(OfflineOutcome::HostLeft) => {
                drop(active);
                self.close_room(&join_code, "The host disconnected").await;
            }
            Some(OfflineOutcome::PlayerOffline {
                identity,
                round_complete,
            }) => {
                info!("{} went offline in room {}", identity, join_code);
                if round_complete {
                    self.complete_round(&join_code, &mut active).await;
                }
                self.broadcast(&join_code, &active.room).await;
                self.spawn_mirror_write(&join_code, &active.room);
            }
            None => {}
        }
    }

    /// Sweeps rooms with no activity past the timeout. Run periodically
    /// from a background task.
    pub async fn cleanup_idle_rooms(&self, timeout: Duration) {
        let candidates: Vec<(String, Arc<Mutex<ActiveRoom>>)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(code, entry)| (code.clone(), entry.clone()))
            .collect();

        for (join_code, entry) in candidates {
            let expired = entry.lock().await.is_expired(timeout);
            if expired {
                self.close_room(&join_code, "Room closed due to inactivity")
                    .await;
            }
        }
    }

    fn caller_identity(room: &Room, connection: ConnectionId) -> Result<String, RoomError> {
        room.by_connection(connection)
            .map(|p| p.identity.clone())
            .ok_or(RoomError::NotHost)
    }

    /// Ends the active question: scores the round, spawns the history
    /// write, and arms the auto-advance timer when the room wants one.
    /// Caller holds the room lock and broadcasts afterwards.
    async fn complete_round(self: &Arc<Self>, join_code: &str, active: &mut ActiveRoom) {
        active.cancel_question_timer();
        let summary = match active.room.finish_round() {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Round completion in room {} failed: {}", join_code, e);
                return;
            }
        };

        let bridge = self.bridge.clone();
        let connections = self.connections.clone();
        let session_id = active.room.session_id;
        let host_connection = active
            .room
            .participant(&active.room.host_id)
            .map(|p| p.connection);
        tokio::spawn(async move {
            if bridge.record_round(session_id, &summary).await {
                // A wholly failed batch means this round's history is
                // gone; the host gets told instead of finding out later.
                if let Some(connection) = host_connection {
                    let _ = connections
                        .send_to_connection(
                            connection,
                            ServerMessage::ErrorMessage {
                                text: RoomError::CriticalHistoryWriteFailure.to_string(),
                            },
                        )
                        .await;
                }
            }
        });

        if active.room.settings.auto_next {
            self.arm_auto_next_timer(join_code, active);
        }
    }

    async fn apply_advance(
        self: &Arc<Self>,
        join_code: &str,
        active: &mut ActiveRoom,
        outcome: AdvanceOutcome,
    ) {
        match outcome {
            AdvanceOutcome::NextQuestion {
                index,
                time_limit_seconds,
            } => {
                info!("Room {} advanced to question {}", join_code, index + 1);
                self.arm_question_timer(join_code, time_limit_seconds, active);
            }
            AdvanceOutcome::GameEnded { standings } => {
                info!("Room {} finished its game", join_code);
                let bridge = self.bridge.clone();
                let session_id = active.room.session_id;
                let quiz_id = active.room.quiz_id.clone();
                let total_questions = active.room.questions.len();
                tokio::spawn(async move {
                    bridge
                        .finalize_game(session_id, &quiz_id, total_questions, &standings)
                        .await;
                });
            }
        }
    }

    fn arm_question_timer(
        self: &Arc<Self>,
        join_code: &str,
        time_limit_seconds: u32,
        active: &mut ActiveRoom,
    ) {
        active.cancel_question_timer();
        let (cancel, mut cancelled) = watch::channel(false);
        let manager = self.clone();
        let join_code = join_code.to_string();
        let armed_for = active.room.current_question_index;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(u64::from(time_limit_seconds))) => {
                    manager.on_question_timeout(&join_code, armed_for).await;
                }
                _ = cancelled.changed() => {}
            }
        });
        active.question_timer = Some(TimerHandle { cancel });
    }

    fn arm_auto_next_timer(self: &Arc<Self>, join_code: &str, active: &mut ActiveRoom) {
        active.cancel_auto_next_timer();
        let (cancel, mut cancelled) = watch::channel(false);
        let manager = self.clone();
        let join_code = join_code.to_string();
        let delay = self.auto_next_delay;
        let armed_for = active.room.current_question_index;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    manager.on_auto_next(&join_code, armed_for).await;
                }
                _ = cancelled.changed() => {}
            }
        });
        active.auto_next_timer = Some(TimerHandle { cancel });
    }

    async fn on_question_timeout(self: &Arc<Self>, join_code: &str, armed_for: i32) {
        let entry = self.rooms.read().await.get(join_code).cloned();
        let Some(entry) = entry else {
            return;
        };
        let mut active = entry.lock().await;
        // A final submission or disconnect may have ended the round
        // between the timer firing and the lock being acquired, and a
        // fire that slipped past cancellation can find the room already
        // cycled onto another question; both must be ignored.
        if active.room.phase != GamePhase::Question
            || active.room.current_question_index != armed_for
        {
            return;
        }

        self.complete_round(join_code, &mut active).await;
        self.broadcast(join_code, &active.room).await;
        self.spawn_mirror_write(join_code, &active.room);
    }

    async fn on_auto_next(self: &Arc<Self>, join_code: &str, armed_for: i32) {
        let entry = self.rooms.read().await.get(join_code).cloned();
        let Some(entry) = entry else {
            return;
        };
        let mut active = entry.lock().await;
        // The host may have advanced manually first, or a stale fire may
        // land on a later round's results.
        if active.room.phase != GamePhase::Results
            || active.room.current_question_index != armed_for
        {
            return;
        }
        active.cancel_auto_next_timer();

        match active.room.advance(None, now_ms()) {
            Ok(outcome) => {
                self.apply_advance(join_code, &mut active, outcome).await;
                self.broadcast(join_code, &active.room).await;
                self.spawn_mirror_write(join_code, &active.room);
            }
            Err(e) => {
                warn!("Auto-advance in room {} failed: {}", join_code, e);
            }
        }
    }
}
