use quiz_core::{Room, RoundSummary, mirror};
use quiz_persistence::ResultsCache;
use quiz_persistence::repositories::{
    HistoryRepository, MirrorRepository, Quiz, QuizRepository, RoundRecord, SessionRepository,
    TeamRepository,
};
use quiz_types::{FinalStanding, GameResults, ParticipantResults, QuestionOutcome};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use quiz_persistence::entities::round_history;

/// All durable-store and cache access for the coordinator. Round and
/// mirror writes are spawned by the caller and must never block room
/// progression; everything here is best-effort with logged failures.
pub struct PersistenceBridge {
    sessions: SessionRepository,
    history: HistoryRepository,
    quizzes: QuizRepository,
    teams: TeamRepository,
    mirrors: MirrorRepository,
    results_cache: ResultsCache,
}

impl PersistenceBridge {
    pub fn new(db: DatabaseConnection, results_ttl: Duration) -> Self {
        Self {
            sessions: SessionRepository::new(db.clone()),
            history: HistoryRepository::new(db.clone()),
            quizzes: QuizRepository::new(db.clone()),
            teams: TeamRepository::new(db.clone()),
            mirrors: MirrorRepository::new(db),
            results_cache: ResultsCache::new(results_ttl),
        }
    }

    pub async fn find_quiz(&self, quiz_id: &str) -> anyhow::Result<Option<Quiz>> {
        self.quizzes.find_quiz_by_id(quiz_id).await
    }

    /// A membership check that fails closed: a store error denies entry
    /// rather than letting an unverified identity into a team room.
    pub async fn is_team_member(&self, team_id: &str, user_id: &str) -> bool {
        match self.teams.is_member(team_id, user_id).await {
            Ok(is_member) => is_member,
            Err(e) => {
                warn!("Team membership check failed for {}: {}", user_id, e);
                false
            }
        }
    }

    pub async fn record_session_created(&self, room: &Room, join_code: &str) {
        if let Err(e) = self
            .sessions
            .create_session(
                room.session_id,
                &room.quiz_id,
                &room.host_id,
                room.team_id.as_deref(),
                join_code,
            )
            .await
        {
            warn!("Failed to create session record {}: {}", room.session_id, e);
        }
    }

    pub async fn record_session_reopened(&self, session_id: Uuid) {
        if let Err(e) = self.sessions.reopen_session(session_id).await {
            warn!("Failed to reopen session record {}: {}", session_id, e);
        }
    }

    /// Writes the round's history records. Returns true when a non-empty
    /// batch failed entirely, which the caller surfaces to the host.
    pub async fn record_round(&self, session_id: Uuid, summary: &RoundSummary) -> bool {
        let records: Vec<RoundRecord> = summary
            .attempts
            .iter()
            .map(|(identity, attempts)| RoundRecord {
                user_id: identity.clone(),
                attempts: attempts.clone(),
                was_correct: attempts
                    .last()
                    .and_then(|a| a.is_correct)
                    .unwrap_or(false),
                score_delta: summary.score_deltas.get(identity).copied().unwrap_or(0),
            })
            .collect();
        if records.is_empty() {
            return false;
        }

        match self
            .history
            .save_round(session_id, summary.question_index as i32, &records)
            .await
        {
            Ok(0) => true,
            Ok(written) => {
                if written < records.len() {
                    warn!(
                        session_id = %session_id,
                        "Round history batch partially written: {}/{}",
                        written,
                        records.len()
                    );
                }
                false
            }
            Err(e) => {
                error!(session_id = %session_id, "Round history batch failed: {}", e);
                true
            }
        }
    }

    /// Marks the session terminal and caches the denormalized results
    /// view so post-game result pages skip the history aggregation.
    pub async fn finalize_game(
        &self,
        session_id: Uuid,
        quiz_id: &str,
        total_questions: usize,
        standings: &[FinalStanding],
    ) {
        if let Err(e) = self.sessions.finalize_session(session_id, standings).await {
            warn!("Failed to finalize session {}: {}", session_id, e);
        }

        match self.history.find_by_session(session_id).await {
            Ok(rows) => {
                let results =
                    build_game_results(session_id, quiz_id, total_questions, standings, &rows);
                self.results_cache.set(&session_id.to_string(), results);
            }
            Err(e) => {
                warn!("Failed to load history for session {}: {}", session_id, e);
            }
        }
    }

    pub fn cached_results(&self, session_id: &str) -> Option<GameResults> {
        self.results_cache.get(session_id)
    }

    pub async fn save_mirror(&self, join_code: &str, room: &Room) {
        let payload = match mirror::serialize_room(room) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize room {} mirror: {}", join_code, e);
                return;
            }
        };
        if let Err(e) = self.mirrors.save(join_code, &payload).await {
            warn!("Failed to write room {} mirror: {}", join_code, e);
        }
    }

    pub async fn load_mirror(&self, join_code: &str) -> Option<Room> {
        let payload = match self.mirrors.load(join_code).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!("Failed to read room {} mirror: {}", join_code, e);
                return None;
            }
        };
        match mirror::deserialize_room(payload) {
            Ok(room) => Some(room),
            Err(e) => {
                warn!("Discarding unreadable mirror for room {}: {}", join_code, e);
                None
            }
        }
    }

    pub async fn delete_mirror(&self, join_code: &str) {
        if let Err(e) = self.mirrors.delete(join_code).await {
            warn!("Failed to delete room {} mirror: {}", join_code, e);
        }
    }
}

/// Aggregates the per-question history rows into per-participant totals,
/// accuracy, and a per-question breakdown, ordered by final rank.
fn build_game_results(
    session_id: Uuid,
    quiz_id: &str,
    total_questions: usize,
    standings: &[FinalStanding],
    rows: &[round_history::Model],
) -> GameResults {
    let participants = standings
        .iter()
        .map(|standing| {
            let mut per_question = Vec::new();
            for row in rows.iter().filter(|r| r.user_id == standing.user_id) {
                let last_option = serde_json::from_str::<Vec<quiz_types::AnswerAttempt>>(
                    &row.attempts,
                )
                .ok()
                .and_then(|attempts| attempts.last().map(|a| a.option_index));
                per_question.push(QuestionOutcome {
                    question_index: row.question_index.max(0) as usize,
                    option_index: last_option,
                    is_correct: Some(row.was_correct),
                    score_delta: row.score_delta,
                });
            }

            let questions_answered = per_question.len() as u32;
            let correct_answers = per_question
                .iter()
                .filter(|q| q.is_correct == Some(true))
                .count() as u32;
            let accuracy = if questions_answered > 0 {
                correct_answers as f64 / questions_answered as f64
            } else {
                0.0
            };

            ParticipantResults {
                user_id: standing.user_id.clone(),
                display_name: standing.display_name.clone(),
                score: standing.score,
                rank: standing.rank,
                correct_answers,
                questions_answered,
                accuracy,
                per_question,
            }
        })
        .collect();

    GameResults {
        session_id,
        quiz_id: quiz_id.to_string(),
        total_questions,
        participants,
    }
}
