//! Flat (de)serialization of a [`Room`] for the durable write-through
//! mirror. The answer map does not survive as a nested object in the
//! mirror store; each identity's attempts are stored under their own
//! `answers:{identity}` key and folded back into the map on recovery.

use crate::room::{Participant, Room};
use anyhow::{Context, Result};
use quiz_types::{
    AnswerAttempt, ConnectionId, GamePhase, ParticipantRole, QuestionSnapshot, RoomSettings,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const ANSWERS_PREFIX: &str = "answers:";

/// Wall-clock milliseconds, the time base for `question_start_ms` and
/// answer timing.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirroredParticipant {
    user_id: UserId,
    display_name: String,
    score: i32,
    role: ParticipantRole,
    has_answered: bool,
}

/// The mirror row payload. Connection handles are process-local and
/// deliberately absent; a recovered room starts with everyone offline.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirroredRoom {
    session_id: Uuid,
    quiz_id: String,
    host_id: UserId,
    team_id: Option<String>,
    settings: RoomSettings,
    game_state: GamePhase,
    questions: Vec<QuestionSnapshot>,
    current_question_index: i32,
    question_start_time: Option<i64>,
    answer_counts: Option<Vec<u32>>,
    participants: Vec<MirroredParticipant>,
    is_final_results: bool,
    #[serde(flatten)]
    flat_answers: HashMap<String, Vec<AnswerAttempt>>,
}

/// Serializes a room into the flat mirror payload.
pub fn serialize_room(room: &Room) -> Result<serde_json::Value> {
    let mirrored = MirroredRoom {
        session_id: room.session_id,
        quiz_id: room.quiz_id.clone(),
        host_id: room.host_id.clone(),
        team_id: room.team_id.clone(),
        settings: room.settings,
        game_state: room.phase,
        questions: room.questions.clone(),
        current_question_index: room.current_question_index,
        question_start_time: room.question_start_ms,
        answer_counts: room.answer_counts.clone(),
        participants: room
            .participants
            .iter()
            .map(|p| MirroredParticipant {
                user_id: p.identity.clone(),
                display_name: p.display_name.clone(),
                score: p.score,
                role: p.role,
                has_answered: p.has_answered,
            })
            .collect(),
        is_final_results: room.is_final_results,
        flat_answers: room
            .answers
            .iter()
            .map(|(identity, attempts)| (format!("{ANSWERS_PREFIX}{identity}"), attempts.clone()))
            .collect(),
    };
    serde_json::to_value(&mirrored).context("failed to serialize room mirror")
}

/// Rebuilds a room from a mirror payload. Every participant comes back
/// offline with a fresh placeholder connection handle; the caller is
/// responsible for not re-arming timers until someone reconnects.
pub fn deserialize_room(value: serde_json::Value) -> Result<Room> {
    let mirrored: MirroredRoom =
        serde_json::from_value(value).context("failed to deserialize room mirror")?;

    let participants = mirrored
        .participants
        .into_iter()
        .map(|p| Participant {
            connection: ConnectionId::new(),
            identity: p.user_id,
            display_name: p.display_name,
            is_online: false,
            score: p.score,
            role: p.role,
            has_answered: p.has_answered,
        })
        .collect();

    let answers = mirrored
        .flat_answers
        .into_iter()
        .filter_map(|(key, attempts)| {
            key.strip_prefix(ANSWERS_PREFIX)
                .map(|identity| (identity.to_string(), attempts))
        })
        .collect();

    Ok(Room {
        session_id: mirrored.session_id,
        quiz_id: mirrored.quiz_id,
        host_id: mirrored.host_id,
        team_id: mirrored.team_id,
        settings: mirrored.settings,
        phase: mirrored.game_state,
        questions: mirrored.questions,
        current_question_index: mirrored.current_question_index,
        question_start_ms: mirrored.question_start_time,
        answers,
        answer_counts: mirrored.answer_counts,
        participants,
        is_final_results: mirrored.is_final_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_types::QuestionSnapshot;

    fn populated_room() -> Room {
        let mut room = Room::new(
            Uuid::new_v4(),
            "quiz-1".to_string(),
            "host-1".to_string(),
            "Quinn".to_string(),
            Some("team-9".to_string()),
            RoomSettings::default(),
            ConnectionId::new(),
        );
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.join("p2".into(), "Sam".into(), ConnectionId::new(), true)
            .unwrap();
        let questions = vec![QuestionSnapshot {
            text: "Capital of France?".into(),
            options: vec!["Paris".into(), "Lyon".into()],
            correct_option: 0,
            points: 10,
            time_limit_seconds: 30,
        }];
        room.start_game("host-1", questions, 0).unwrap();
        room.submit_answer("p1", 0, 5_000).unwrap();
        room
    }

    #[test]
    fn round_trip_preserves_game_state() {
        let room = populated_room();
        let value = serialize_room(&room).unwrap();
        let restored = deserialize_room(value).unwrap();

        assert_eq!(restored.session_id, room.session_id);
        assert_eq!(restored.phase, room.phase);
        assert_eq!(restored.current_question_index, 0);
        assert_eq!(restored.questions.len(), 1);
        assert_eq!(restored.participants.len(), 3);
        assert_eq!(restored.answers["p1"].len(), 1);
        assert_eq!(restored.answers["p1"][0].option_index, 0);
    }

    #[test]
    fn answers_are_flattened_per_identity() {
        let room = populated_room();
        let value = serialize_room(&room).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("answers:p1"));
        assert!(!object.contains_key("answers"));
    }

    #[test]
    fn recovered_participants_are_offline_with_fresh_handles() {
        let room = populated_room();
        let original_conns: Vec<_> = room.participants.iter().map(|p| p.connection).collect();

        let restored = deserialize_room(serialize_room(&room).unwrap()).unwrap();
        for (p, original) in restored.participants.iter().zip(original_conns) {
            assert!(!p.is_online);
            assert_ne!(p.connection, original);
        }
        let host = restored.participant("host-1").unwrap();
        assert_eq!(host.role, ParticipantRole::Host);
    }
}
