use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

/// Registered-user id or guest token. Guests are not backed by an
/// account, so this is an opaque string rather than a Uuid.
pub type UserId = String;

/// Opaque handle to one live client connection. Reassigned on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Lobby,
    Question,
    Results,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Host,
    Player,
}

/// Host-mutable room settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub auto_next: bool,
    pub allow_answer_change: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            auto_next: false,
            allow_answer_change: false,
        }
    }
}

/// One question as loaded at game start. Immutable for the whole game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSnapshot {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub points: i32,
    pub time_limit_seconds: u32,
}

/// One answer attempt. Correctness is resolved at round end, not at
/// submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAttempt {
    pub option_index: usize,
    pub remaining_time_seconds: f64,
    pub is_correct: Option<bool>,
}

/// Participant as seen by every client in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: UserId,
    pub display_name: String,
    pub score: i32,
    pub is_online: bool,
    pub role: ParticipantRole,
    pub has_answered: bool,
}

/// Phase- and recipient-aware view of the current question.
///
/// During the question phase `correct_option` and the `your_*` fields are
/// `None`; in results they are filled in, with `your_*` reflecting only
/// the recipient's own last attempt. No recipient ever sees another
/// participant's chosen option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    pub points: i32,
    pub time_limit_seconds: u32,
    pub correct_option: Option<usize>,
    pub your_option: Option<usize>,
    pub your_correct: Option<bool>,
}

/// Final standing of one participant, rank assigned by descending score
/// with ties broken by stable join order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FinalStanding {
    pub user_id: UserId,
    pub display_name: String,
    pub score: i32,
    pub rank: u32,
}

/// One participant's outcome for one question, as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_index: usize,
    pub option_index: Option<usize>,
    pub is_correct: Option<bool>,
    pub score_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResults {
    pub user_id: UserId,
    pub display_name: String,
    pub score: i32,
    pub rank: u32,
    pub correct_answers: u32,
    pub questions_answered: u32,
    pub accuracy: f64,
    pub per_question: Vec<QuestionOutcome>,
}

/// Denormalized post-game results view, computed once at finalization
/// and served from the short-TTL cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GameResults {
    pub session_id: Uuid,
    pub quiz_id: String,
    pub total_questions: usize,
    pub participants: Vec<ParticipantResults>,
}
