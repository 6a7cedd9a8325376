use crate::room::Room;
use crate::scoring::{score_for_answer, tally_last_attempts};
use quiz_types::{
    AnswerAttempt, FinalStanding, GamePhase, ParticipantRole, QuestionSnapshot, RoomError, UserId,
};
use std::collections::HashMap;

/// Everything the round-end step produced, handed to the persistence
/// bridge for the history write.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub question_index: usize,
    pub answer_counts: Vec<u32>,
    /// Points gained this round, keyed by identity. Zero-gain entries are
    /// present for every participant who attempted the question.
    pub score_deltas: HashMap<UserId, i32>,
    /// Full attempt lists with correctness resolved.
    pub attempts: HashMap<UserId, Vec<AnswerAttempt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    NextQuestion {
        index: usize,
        time_limit_seconds: u32,
    },
    GameEnded {
        standings: Vec<FinalStanding>,
    },
}

impl Room {
    /// Host starts the game from the lobby. Questions are snapshotted
    /// once here and stay immutable for the whole game. Returns the
    /// first question's time limit so the caller can arm the timer.
    pub fn start_game(
        &mut self,
        caller: &str,
        questions: Vec<QuestionSnapshot>,
        now_ms: i64,
    ) -> Result<u32, RoomError> {
        if !self.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if !matches!(self.phase, GamePhase::Lobby) {
            return Err(RoomError::InvalidPhaseForAction);
        }
        if questions.is_empty() {
            return Err(RoomError::QuizHasNoQuestions);
        }
        let any_player_online = self
            .participants
            .iter()
            .any(|p| p.role == ParticipantRole::Player && p.is_online);
        if !any_player_online {
            return Err(RoomError::InvalidPhaseForAction);
        }

        self.questions = questions;
        Ok(self.begin_question(0, now_ms))
    }

    /// Enters the question phase at `index`: per-round state is cleared
    /// and the timing anchor stamped. Returns the question's time limit.
    fn begin_question(&mut self, index: usize, now_ms: i64) -> u32 {
        self.answers.clear();
        self.answer_counts = None;
        for p in &mut self.participants {
            p.has_answered = false;
        }
        self.current_question_index = index as i32;
        self.question_start_ms = Some(now_ms);
        self.phase = GamePhase::Question;
        self.questions[index].time_limit_seconds
    }

    /// Ends the active round: tallies the per-option counts from each
    /// participant's last attempt, resolves correctness, and applies the
    /// scoring function. This is the only place a score changes.
    pub fn finish_round(&mut self) -> Result<RoundSummary, RoomError> {
        if !matches!(self.phase, GamePhase::Question) {
            return Err(RoomError::InvalidPhaseForAction);
        }
        let question_index = usize::try_from(self.current_question_index)
            .map_err(|_| RoomError::InvalidPhaseForAction)?;
        let question = self.questions[question_index].clone();

        let counts = tally_last_attempts(&self.answers, question.options.len());

        let mut score_deltas = HashMap::new();
        let mut attempts = HashMap::new();
        for (identity, list) in &mut self.answers {
            for attempt in list.iter_mut() {
                attempt.is_correct = Some(attempt.option_index == question.correct_option);
            }
            // Only the last attempt counts for scoring.
            let delta = match list.last() {
                Some(last) if last.is_correct == Some(true) => score_for_answer(
                    question.points,
                    question.time_limit_seconds,
                    last.remaining_time_seconds,
                ),
                _ => 0,
            };
            score_deltas.insert(identity.clone(), delta);
            attempts.insert(identity.clone(), list.clone());
        }
        for p in &mut self.participants {
            if let Some(delta) = score_deltas.get(&p.identity) {
                p.score += delta;
            }
        }

        self.answer_counts = Some(counts.clone());
        self.question_start_ms = None;
        self.phase = GamePhase::Results;

        Ok(RoundSummary {
            question_index,
            answer_counts: counts,
            score_deltas,
            attempts,
        })
    }

    /// Moves from results to the next question, or to the end of the
    /// game once the questions run out. `caller` is `None` when the
    /// auto-next timer fires.
    pub fn advance(
        &mut self,
        caller: Option<&str>,
        now_ms: i64,
    ) -> Result<AdvanceOutcome, RoomError> {
        if let Some(caller) = caller {
            if !self.is_host(caller) {
                return Err(RoomError::NotHost);
            }
        }
        if !matches!(self.phase, GamePhase::Results) {
            return Err(RoomError::InvalidPhaseForAction);
        }

        let next = (self.current_question_index + 1) as usize;
        if next >= self.questions.len() {
            self.current_question_index = self.questions.len() as i32;
            self.phase = GamePhase::End;
            self.is_final_results = true;
            Ok(AdvanceOutcome::GameEnded {
                standings: self.final_standings(),
            })
        } else {
            let time_limit_seconds = self.begin_question(next, now_ms);
            Ok(AdvanceOutcome::NextQuestion {
                index: next,
                time_limit_seconds,
            })
        }
    }

    /// Back to the lobby for another run of the same questions. Scores
    /// and per-round state reset; the participant list survives.
    pub fn play_again(&mut self, caller: &str) -> Result<(), RoomError> {
        if !self.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if !matches!(self.phase, GamePhase::End) {
            return Err(RoomError::InvalidPhaseForAction);
        }

        for p in &mut self.participants {
            p.score = 0;
            p.has_answered = false;
        }
        self.answers.clear();
        self.answer_counts = None;
        self.current_question_index = -1;
        self.question_start_ms = None;
        self.is_final_results = false;
        self.phase = GamePhase::Lobby;
        Ok(())
    }

    /// Standings sorted descending by score; ties keep join order, and
    /// ranks are assigned by that order.
    pub fn final_standings(&self) -> Vec<FinalStanding> {
        let mut ranked: Vec<_> = self
            .participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Player)
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| FinalStanding {
                user_id: p.identity.clone(),
                display_name: p.display_name.clone(),
                score: p.score,
                rank: (i + 1) as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_types::{ConnectionId, RoomSettings};
    use uuid::Uuid;

    fn room_with_players(names: &[&str]) -> Room {
        let mut room = Room::new(
            Uuid::new_v4(),
            "quiz-1".to_string(),
            "host-1".to_string(),
            "Quinn".to_string(),
            None,
            RoomSettings::default(),
            ConnectionId::new(),
        );
        for name in names {
            room.join(name.to_string(), name.to_string(), ConnectionId::new(), true)
                .unwrap();
        }
        room
    }

    fn questions(n: usize) -> Vec<QuestionSnapshot> {
        (0..n)
            .map(|i| QuestionSnapshot {
                text: format!("Q{}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_option: 1,
                points: 10,
                time_limit_seconds: 30,
            })
            .collect()
    }

    #[test]
    fn start_game_requires_host() {
        let mut room = room_with_players(&["p1"]);
        let err = room.start_game("p1", questions(1), 0).unwrap_err();
        assert_eq!(err, RoomError::NotHost);
    }

    #[test]
    fn start_game_requires_questions() {
        let mut room = room_with_players(&["p1"]);
        let err = room.start_game("host-1", Vec::new(), 0).unwrap_err();
        assert_eq!(err, RoomError::QuizHasNoQuestions);
        assert_eq!(room.phase, GamePhase::Lobby);
    }

    #[test]
    fn start_game_requires_an_online_player() {
        let mut room = room_with_players(&[]);
        let err = room.start_game("host-1", questions(1), 0).unwrap_err();
        assert_eq!(err, RoomError::InvalidPhaseForAction);
    }

    #[test]
    fn start_game_enters_first_question() {
        let mut room = room_with_players(&["p1"]);
        let limit = room.start_game("host-1", questions(2), 1_000).unwrap();
        assert_eq!(limit, 30);
        assert_eq!(room.phase, GamePhase::Question);
        assert_eq!(room.current_question_index, 0);
        assert_eq!(room.question_start_ms, Some(1_000));
    }

    #[test]
    fn finish_round_scores_last_correct_attempt() {
        let mut room = room_with_players(&["p1", "p2"]);
        room.settings.allow_answer_change = true;
        room.start_game("host-1", questions(1), 0).unwrap();

        // p1 ends on the correct option with 15s left; p2 on a wrong one.
        room.submit_answer("p1", 0, 5_000).unwrap();
        room.submit_answer("p1", 1, 15_000).unwrap();
        room.submit_answer("p2", 2, 10_000).unwrap();

        let summary = room.finish_round().unwrap();
        assert_eq!(room.phase, GamePhase::Results);
        assert_eq!(summary.score_deltas["p1"], 15); // 10 * (1 + 15/30)
        assert_eq!(summary.score_deltas["p2"], 0);
        assert_eq!(room.participant("p1").unwrap().score, 15);
        assert_eq!(room.participant("p2").unwrap().score, 0);
    }

    #[test]
    fn finish_round_tallies_last_attempts_once_per_submitter() {
        let mut room = room_with_players(&["p1", "p2", "p3"]);
        room.settings.allow_answer_change = true;
        room.start_game("host-1", questions(1), 0).unwrap();

        room.submit_answer("p1", 0, 1_000).unwrap();
        room.submit_answer("p1", 2, 2_000).unwrap();
        room.submit_answer("p2", 2, 3_000).unwrap();
        // p3 never answers.

        let summary = room.finish_round().unwrap();
        assert_eq!(summary.answer_counts, vec![0, 0, 2, 0]);
        let total: u32 = summary.answer_counts.iter().sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn finish_round_resolves_correctness_on_every_attempt() {
        let mut room = room_with_players(&["p1"]);
        room.settings.allow_answer_change = true;
        room.start_game("host-1", questions(1), 0).unwrap();
        room.submit_answer("p1", 1, 1_000).unwrap();
        room.submit_answer("p1", 3, 2_000).unwrap();

        let summary = room.finish_round().unwrap();
        let attempts = &summary.attempts["p1"];
        assert_eq!(attempts[0].is_correct, Some(true));
        assert_eq!(attempts[1].is_correct, Some(false));
        // Last attempt is wrong, so no points.
        assert_eq!(summary.score_deltas["p1"], 0);
    }

    #[test]
    fn advance_moves_to_next_question() {
        let mut room = room_with_players(&["p1"]);
        room.start_game("host-1", questions(2), 0).unwrap();
        room.submit_answer("p1", 1, 1_000).unwrap();
        room.finish_round().unwrap();

        let outcome = room.advance(Some("host-1"), 60_000).unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::NextQuestion {
                index: 1,
                time_limit_seconds: 30
            }
        );
        assert_eq!(room.phase, GamePhase::Question);
        assert!(room.answers.is_empty());
        assert!(room.answer_counts.is_none());
        assert!(!room.participant("p1").unwrap().has_answered);
    }

    #[test]
    fn advance_past_last_question_ends_game() {
        let mut room = room_with_players(&["p1", "p2"]);
        room.start_game("host-1", questions(1), 0).unwrap();
        room.submit_answer("p1", 1, 1_000).unwrap();
        room.submit_answer("p2", 3, 1_000).unwrap();
        room.finish_round().unwrap();

        let outcome = room.advance(None, 60_000).unwrap();
        let AdvanceOutcome::GameEnded { standings } = outcome else {
            panic!("expected game end");
        };
        assert_eq!(room.phase, GamePhase::End);
        assert!(room.is_final_results);
        assert_eq!(room.current_question_index, 1);
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].user_id, "p1");
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[1].rank, 2);
    }

    #[test]
    fn standings_break_ties_by_join_order() {
        let mut room = room_with_players(&["first", "second", "third"]);
        room.participant_mut("first").unwrap().score = 10;
        room.participant_mut("second").unwrap().score = 20;
        room.participant_mut("third").unwrap().score = 10;

        let standings = room.final_standings();
        assert_eq!(standings[0].user_id, "second");
        assert_eq!(standings[1].user_id, "first");
        assert_eq!(standings[2].user_id, "third");
    }

    #[test]
    fn play_again_resets_exactly() {
        let mut room = room_with_players(&["p1"]);
        room.start_game("host-1", questions(1), 0).unwrap();
        room.submit_answer("p1", 1, 1_000).unwrap();
        room.finish_round().unwrap();
        room.advance(Some("host-1"), 2_000).unwrap();
        assert_eq!(room.phase, GamePhase::End);

        assert_eq!(room.play_again("p1"), Err(RoomError::NotHost));
        room.play_again("host-1").unwrap();

        assert_eq!(room.phase, GamePhase::Lobby);
        assert_eq!(room.current_question_index, -1);
        assert!(!room.is_final_results);
        assert_eq!(room.questions.len(), 1);
        for p in &room.participants {
            assert_eq!(p.score, 0);
            assert!(!p.has_answered);
        }
    }

    #[test]
    fn two_question_game_rewards_fast_answers_more() {
        let mut room = room_with_players(&["p1"]);
        room.start_game("host-1", questions(2), 0).unwrap();

        // Correct after 1s of 30: nearly the full 2x bonus
        room.submit_answer("p1", 1, 1_000).unwrap();
        let first = room.finish_round().unwrap();
        let first_gain = first.score_deltas["p1"];
        assert_eq!(first_gain, 20);

        room.advance(Some("host-1"), 31_000).unwrap();

        // Correct after 25s of 30: above base but well below the first gain
        room.submit_answer("p1", 1, 56_000).unwrap();
        let second = room.finish_round().unwrap();
        let second_gain = second.score_deltas["p1"];
        assert_eq!(second_gain, 12);
        assert!(second_gain >= 10 && second_gain < first_gain);

        let outcome = room.advance(Some("host-1"), 57_000).unwrap();
        assert_eq!(room.phase, GamePhase::End);
        let AdvanceOutcome::GameEnded { standings } = outcome else {
            panic!("Expected the game to end");
        };
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[0].score, first_gain + second_gain);
    }
}
