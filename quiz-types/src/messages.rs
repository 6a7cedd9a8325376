use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{GamePhase, ParticipantView, QuestionView, RoomSettings, UserId};

/// The closed set of inbound client messages. `room_id` is the short
/// numeric join code, not the durable session id.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom {
        quiz_id: String,
        host_id: UserId,
        host_name: String,
        team_id: Option<String>,
        settings: RoomSettings,
    },
    UpdateSettings {
        room_id: String,
        settings: RoomSettings,
    },
    JoinRoom {
        room_id: String,
        user_id: UserId,
        username: String,
    },
    StartGame {
        room_id: String,
    },
    EndGame {
        room_id: String,
    },
    SubmitAnswer {
        room_id: String,
        user_id: UserId,
        option_index: usize,
    },
    RequestNextQuestion {
        room_id: String,
    },
    PlayAgain {
        room_id: String,
    },
}

/// Coordinator-to-client pushes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full per-recipient snapshot, sent individually to every online
    /// participant after each state-changing operation.
    GameUpdate(GameSnapshot),
    /// Sent once to a reconnecting participant who already has an
    /// attempt recorded for the in-progress question.
    YourSelected { option: usize, question_no: usize },
    /// Guard failure, pushed to the offending connection only.
    ErrorMessage { text: String },
    /// The room was torn down (host ended the game or disconnected).
    RoomClosed { reason: String },
}

/// The `game-update` payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub session_id: Uuid,
    pub room_id: String,
    pub game_state: GamePhase,
    pub participants: Vec<ParticipantView>,
    pub current_question_index: i32,
    pub total_questions: usize,
    pub is_final_results: bool,
    pub settings: RoomSettings,
    /// Unix millis when the current question started; the client's
    /// countdown anchor. `None` outside the question phase.
    pub question_start_time: Option<i64>,
    /// Per-option tally for the question just completed. Present during
    /// results, absent otherwise.
    pub answer_counts: Option<Vec<u32>>,
    pub question: Option<QuestionView>,
    pub error: Option<String>,
    pub your_user_id: UserId,
}
