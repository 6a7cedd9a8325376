use quiz_types::{
    AnswerAttempt, ConnectionId, GamePhase, ParticipantRole, ParticipantView, QuestionSnapshot,
    RoomError, RoomSettings, UserId,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Hard cap on participants per room, host included.
pub const MAX_PARTICIPANTS: usize = 50;

#[derive(Debug, Clone)]
pub struct Participant {
    pub connection: ConnectionId,
    pub identity: UserId,
    pub display_name: String,
    pub is_online: bool,
    pub score: i32,
    pub role: ParticipantRole,
    pub has_answered: bool,
}

impl Participant {
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            user_id: self.identity.clone(),
            display_name: self.display_name.clone(),
            score: self.score,
            is_online: self.is_online,
            role: self.role,
            has_answered: self.has_answered,
        }
    }
}

/// Outcome of a join attempt. A second join with a known identity is
/// redirected to reconnect semantics instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined,
    /// `resume` carries the reconnecting participant's existing selection
    /// for the in-progress question, if any.
    Rejoined {
        resume: Option<ResumeSelection>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSelection {
    pub option: usize,
    pub question_no: usize,
}

/// What a disconnect did to the room.
#[derive(Debug, Clone, PartialEq)]
pub enum OfflineOutcome {
    /// The host's connection dropped; the room must be torn down.
    HostLeft,
    /// A player went offline. `round_complete` is true when, under the
    /// no-answer-change policy, every remaining online player has already
    /// answered the active question.
    PlayerOffline {
        identity: UserId,
        round_complete: bool,
    },
}

/// One live game instance. All mutation goes through the operation
/// methods here and in `rounds`; callers are expected to serialize
/// access per room.
#[derive(Debug, Clone)]
pub struct Room {
    pub session_id: Uuid,
    pub quiz_id: String,
    pub host_id: UserId,
    pub team_id: Option<String>,
    pub settings: RoomSettings,
    pub phase: GamePhase,
    pub questions: Vec<QuestionSnapshot>,
    /// -1 before start; `== questions.len()` once the game has ended.
    pub current_question_index: i32,
    pub question_start_ms: Option<i64>,
    /// Attempts per identity for the current question only.
    pub answers: HashMap<UserId, Vec<AnswerAttempt>>,
    /// Per-option tally for the question just completed.
    pub answer_counts: Option<Vec<u32>>,
    /// Insertion order doubles as the stable tie-break for final ranks.
    pub participants: Vec<Participant>,
    pub is_final_results: bool,
}

impl Room {
    pub fn new(
        session_id: Uuid,
        quiz_id: String,
        host_id: UserId,
        host_name: String,
        team_id: Option<String>,
        settings: RoomSettings,
        host_connection: ConnectionId,
    ) -> Self {
        let host = Participant {
            connection: host_connection,
            identity: host_id.clone(),
            display_name: host_name,
            is_online: true,
            score: 0,
            role: ParticipantRole::Host,
            has_answered: false,
        };

        Self {
            session_id,
            quiz_id,
            host_id,
            team_id,
            settings,
            phase: GamePhase::Lobby,
            questions: Vec::new(),
            current_question_index: -1,
            question_start_ms: None,
            answers: HashMap::new(),
            answer_counts: None,
            participants: vec![host],
            is_final_results: false,
        }
    }

    pub fn participant(&self, identity: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn participant_mut(&mut self, identity: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.identity == identity)
    }

    pub fn by_connection(&self, connection: ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection == connection)
    }

    pub fn is_host(&self, identity: &str) -> bool {
        self.host_id == identity
    }

    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        usize::try_from(self.current_question_index)
            .ok()
            .and_then(|i| self.questions.get(i))
    }

    /// The question whose results are on display: the active one during
    /// a round, the last one once the game has ended.
    pub fn displayed_question(&self) -> Option<(usize, &QuestionSnapshot)> {
        match self.phase {
            GamePhase::Lobby => None,
            GamePhase::Question | GamePhase::Results => usize::try_from(self.current_question_index)
                .ok()
                .and_then(|i| self.questions.get(i).map(|q| (i, q))),
            GamePhase::End => self
                .questions
                .last()
                .map(|q| (self.questions.len() - 1, q)),
        }
    }

    /// Host-only, and never mid-question.
    pub fn update_settings(
        &mut self,
        caller: &str,
        settings: RoomSettings,
    ) -> Result<(), RoomError> {
        if !self.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if matches!(self.phase, GamePhase::Question) {
            return Err(RoomError::InvalidPhaseForAction);
        }
        self.settings = settings;
        Ok(())
    }

    /// Adds a participant, or falls through to reconnect semantics when
    /// the identity is already known. Guards are checked in order:
    /// full, ended, team membership.
    pub fn join(
        &mut self,
        identity: UserId,
        display_name: String,
        connection: ConnectionId,
        is_team_member: bool,
    ) -> Result<JoinOutcome, RoomError> {
        if self.participant(&identity).is_some() {
            return Ok(JoinOutcome::Rejoined {
                resume: self.rejoin(&identity, connection),
            });
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(RoomError::RoomFull);
        }
        if matches!(self.phase, GamePhase::End) {
            return Err(RoomError::GameAlreadyEnded);
        }
        if self.team_id.is_some() && !is_team_member {
            return Err(RoomError::NotATeamMember);
        }

        self.participants.push(Participant {
            connection,
            identity,
            display_name,
            is_online: true,
            score: 0,
            role: ParticipantRole::Player,
            has_answered: false,
        });
        Ok(JoinOutcome::Joined)
    }

    /// Swaps the connection handle and marks the participant online
    /// again. Score and attempt history are preserved. Returns the
    /// existing selection for the in-progress question, if any.
    fn rejoin(&mut self, identity: &str, connection: ConnectionId) -> Option<ResumeSelection> {
        let mid_question = matches!(self.phase, GamePhase::Question);
        let question_no = usize::try_from(self.current_question_index).ok();

        let participant = self.participant_mut(identity)?;
        participant.connection = connection;
        participant.is_online = true;

        if !mid_question {
            return None;
        }
        let last = self.answers.get(identity).and_then(|a| a.last())?;
        Some(ResumeSelection {
            option: last.option_index,
            question_no: question_no?,
        })
    }

    /// Marks the owner of `connection` offline. Participants are never
    /// removed, so score and history survive a reconnect. A stale handle
    /// (already superseded by a rejoin) is ignored.
    pub fn mark_offline(&mut self, connection: ConnectionId) -> Option<OfflineOutcome> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.connection == connection)?;
        participant.is_online = false;

        if participant.role == ParticipantRole::Host {
            return Some(OfflineOutcome::HostLeft);
        }

        let identity = participant.identity.clone();
        let round_complete = matches!(self.phase, GamePhase::Question)
            && !self.settings.allow_answer_change
            && self.all_online_players_answered();
        Some(OfflineOutcome::PlayerOffline {
            identity,
            round_complete,
        })
    }

    /// True when every currently-online player has answered the active
    /// question. Offline players are deliberately excluded, so a single
    /// online player can complete a round alone.
    pub fn all_online_players_answered(&self) -> bool {
        self.participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Player && p.is_online)
            .all(|p| p.has_answered)
    }

    /// Records an answer attempt for the active question. Returns whether
    /// the submission completed the round (all online players answered,
    /// only meaningful when answer changes are disabled). A repeat
    /// submission under the no-change policy is silently ignored.
    pub fn submit_answer(
        &mut self,
        identity: &str,
        option_index: usize,
        now_ms: i64,
    ) -> Result<bool, RoomError> {
        if !matches!(self.phase, GamePhase::Question) {
            return Err(RoomError::InvalidPhaseForAction);
        }
        let Some(question) = self.current_question() else {
            return Err(RoomError::InvalidPhaseForAction);
        };
        let time_limit = question.time_limit_seconds;

        let allow_change = self.settings.allow_answer_change;
        let start_ms = self.question_start_ms.unwrap_or(now_ms);
        let Some(participant) = self.participant_mut(identity) else {
            return Err(RoomError::InvalidPhaseForAction);
        };
        if participant.role != ParticipantRole::Player {
            return Err(RoomError::InvalidPhaseForAction);
        }
        if participant.has_answered && !allow_change {
            // First accepted answer is final under this policy.
            return Ok(false);
        }
        participant.has_answered = true;

        let elapsed = (now_ms - start_ms) as f64 / 1000.0;
        let remaining = (time_limit as f64 - elapsed).max(0.0);
        self.answers
            .entry(identity.to_string())
            .or_default()
            .push(AnswerAttempt {
                option_index,
                remaining_time_seconds: remaining,
                is_correct: None,
            });

        Ok(!allow_change && self.all_online_players_answered())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_types::GamePhase;

    pub(crate) fn test_room() -> Room {
        Room::new(
            Uuid::new_v4(),
            "quiz-1".to_string(),
            "host-1".to_string(),
            "Quinn".to_string(),
            None,
            RoomSettings::default(),
            ConnectionId::new(),
        )
    }

    pub(crate) fn test_questions(n: usize) -> Vec<QuestionSnapshot> {
        (0..n)
            .map(|i| QuestionSnapshot {
                text: format!("Question {}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_option: 1,
                points: 10,
                time_limit_seconds: 30,
            })
            .collect()
    }

    #[test]
    fn room_starts_in_lobby_with_host() {
        let room = test_room();
        assert_eq!(room.phase, GamePhase::Lobby);
        assert_eq!(room.current_question_index, -1);
        assert_eq!(room.participants.len(), 1);
        assert_eq!(room.participants[0].role, ParticipantRole::Host);
    }

    #[test]
    fn join_adds_player_once() {
        let mut room = test_room();
        let outcome = room
            .join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Joined);
        assert_eq!(room.participants.len(), 2);
    }

    #[test]
    fn join_twice_is_idempotent_reconnect() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.participant_mut("p1").unwrap().score = 15;

        let new_conn = ConnectionId::new();
        let outcome = room
            .join("p1".into(), "Pat".into(), new_conn, true)
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Rejoined { resume: None });
        assert_eq!(room.participants.len(), 2);
        let p = room.participant("p1").unwrap();
        assert_eq!(p.score, 15);
        assert_eq!(p.connection, new_conn);
        assert!(p.is_online);
    }

    #[test]
    fn join_rejects_when_full() {
        let mut room = test_room();
        for i in 0..MAX_PARTICIPANTS - 1 {
            room.join(
                format!("p{i}"),
                format!("Player {i}"),
                ConnectionId::new(),
                true,
            )
            .unwrap();
        }
        let err = room
            .join("late".into(), "Late".into(), ConnectionId::new(), true)
            .unwrap_err();
        assert_eq!(err, RoomError::RoomFull);
    }

    #[test]
    fn join_rejects_after_game_end() {
        let mut room = test_room();
        room.phase = GamePhase::End;
        let err = room
            .join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap_err();
        assert_eq!(err, RoomError::GameAlreadyEnded);
    }

    #[test]
    fn join_enforces_team_membership() {
        let mut room = test_room();
        room.team_id = Some("team-9".into());
        let err = room
            .join("p1".into(), "Pat".into(), ConnectionId::new(), false)
            .unwrap_err();
        assert_eq!(err, RoomError::NotATeamMember);

        room.join("p2".into(), "Member".into(), ConnectionId::new(), true)
            .unwrap();
    }

    #[test]
    fn rejoin_mid_question_resumes_selection() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.start_game("host-1", test_questions(2), 0).unwrap();
        room.submit_answer("p1", 2, 5_000).unwrap();

        let outcome = room
            .join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Rejoined {
                resume: Some(ResumeSelection {
                    option: 2,
                    question_no: 0
                })
            }
        );
    }

    #[test]
    fn settings_update_is_host_only_and_not_mid_question() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        let settings = RoomSettings {
            auto_next: true,
            allow_answer_change: true,
        };

        assert_eq!(
            room.update_settings("p1", settings),
            Err(RoomError::NotHost)
        );
        room.update_settings("host-1", settings).unwrap();
        assert!(room.settings.auto_next);

        room.start_game("host-1", test_questions(1), 0).unwrap();
        assert_eq!(
            room.update_settings("host-1", RoomSettings::default()),
            Err(RoomError::InvalidPhaseForAction)
        );
    }

    #[test]
    fn host_disconnect_is_fatal() {
        let mut room = test_room();
        let host_conn = room.participants[0].connection;
        assert_eq!(room.mark_offline(host_conn), Some(OfflineOutcome::HostLeft));
    }

    #[test]
    fn player_disconnect_marks_offline_and_keeps_record() {
        let mut room = test_room();
        let conn = ConnectionId::new();
        room.join("p1".into(), "Pat".into(), conn, true).unwrap();

        let outcome = room.mark_offline(conn).unwrap();
        assert_eq!(
            outcome,
            OfflineOutcome::PlayerOffline {
                identity: "p1".into(),
                round_complete: false,
            }
        );
        let p = room.participant("p1").unwrap();
        assert!(!p.is_online);
        assert_eq!(room.participants.len(), 2);
    }

    #[test]
    fn disconnect_of_last_unanswered_player_completes_round() {
        let mut room = test_room();
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        room.join("a".into(), "A".into(), conn_a, true).unwrap();
        room.join("b".into(), "B".into(), conn_b, true).unwrap();
        room.start_game("host-1", test_questions(1), 0).unwrap();

        room.submit_answer("a", 1, 1_000).unwrap();
        let outcome = room.mark_offline(conn_b).unwrap();
        assert_eq!(
            outcome,
            OfflineOutcome::PlayerOffline {
                identity: "b".into(),
                round_complete: true,
            }
        );
    }

    #[test]
    fn submit_outside_question_phase_is_rejected() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        let err = room.submit_answer("p1", 0, 0).unwrap_err();
        assert_eq!(err, RoomError::InvalidPhaseForAction);
    }

    #[test]
    fn host_cannot_submit_answers() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.start_game("host-1", test_questions(1), 0).unwrap();
        let err = room.submit_answer("host-1", 0, 0).unwrap_err();
        assert_eq!(err, RoomError::InvalidPhaseForAction);
    }

    #[test]
    fn repeat_submission_ignored_without_answer_change() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.start_game("host-1", test_questions(1), 0).unwrap();

        room.submit_answer("p1", 0, 1_000).unwrap();
        room.submit_answer("p1", 3, 2_000).unwrap();
        assert_eq!(room.answers["p1"].len(), 1);
        assert_eq!(room.answers["p1"][0].option_index, 0);
    }

    #[test]
    fn answer_change_appends_attempts_and_never_completes_early() {
        let mut room = test_room();
        room.settings.allow_answer_change = true;
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.start_game("host-1", test_questions(1), 0).unwrap();

        let done = room.submit_answer("p1", 0, 1_000).unwrap();
        assert!(!done);
        let done = room.submit_answer("p1", 2, 2_000).unwrap();
        assert!(!done);
        assert_eq!(room.answers["p1"].len(), 2);
    }

    #[test]
    fn remaining_time_is_clamped_to_zero() {
        let mut room = test_room();
        room.join("p1".into(), "Pat".into(), ConnectionId::new(), true)
            .unwrap();
        room.start_game("host-1", test_questions(1), 0).unwrap();

        // 40s elapsed on a 30s question.
        room.submit_answer("p1", 1, 40_000).unwrap();
        assert_eq!(room.answers["p1"][0].remaining_time_seconds, 0.0);
    }
}
