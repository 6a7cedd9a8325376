use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Everything a room operation can refuse with. Guard failures are
/// pushed to the offending connection only; they never affect other
/// participants' view of the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Error)]
#[ts(export)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("This game has already ended")]
    GameAlreadyEnded,
    #[error("You are not a member of this room's team")]
    NotATeamMember,
    #[error("Only the host can do that")]
    NotHost,
    #[error("That action is not valid in the current phase")]
    InvalidPhaseForAction,
    #[error("Quiz has no questions")]
    QuizHasNoQuestions,
    /// Non-fatal: logged, the room keeps progressing.
    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },
    /// Surfaced to the host specifically since it threatens result
    /// correctness, but does not halt the room.
    #[error("Failed to record round history")]
    CriticalHistoryWriteFailure,
}
