use crate::room::Room;
use crate::room::Participant;
use quiz_types::{ConnectionId, GamePhase, GameSnapshot, QuestionView};

/// Builds the per-recipient snapshots for everyone currently online.
/// The shared base is identical for all recipients; the question view
/// differs by phase and recipient so the correct answer stays hidden
/// until results, and nobody sees anyone else's selection.
pub fn project(room: &Room, join_code: &str) -> Vec<(ConnectionId, GameSnapshot)> {
    let participants: Vec<_> = room.participants.iter().map(|p| p.view()).collect();

    room.participants
        .iter()
        .filter(|p| p.is_online)
        .map(|recipient| {
            let snapshot = GameSnapshot {
                session_id: room.session_id,
                room_id: join_code.to_string(),
                game_state: room.phase,
                participants: participants.clone(),
                current_question_index: room.current_question_index,
                total_questions: room.questions.len(),
                is_final_results: room.is_final_results,
                settings: room.settings,
                question_start_time: room.question_start_ms,
                answer_counts: room.answer_counts.clone(),
                question: question_view_for(room, recipient),
                error: None,
                your_user_id: recipient.identity.clone(),
            };
            (recipient.connection, snapshot)
        })
        .collect()
}

fn question_view_for(room: &Room, recipient: &Participant) -> Option<QuestionView> {
    let (_, question) = room.displayed_question()?;

    let mut view = QuestionView {
        text: question.text.clone(),
        options: question.options.clone(),
        points: question.points,
        time_limit_seconds: question.time_limit_seconds,
        correct_option: None,
        your_option: None,
        your_correct: None,
    };

    if matches!(room.phase, GamePhase::Results | GamePhase::End) {
        view.correct_option = Some(question.correct_option);
        if let Some(last) = room
            .answers
            .get(&recipient.identity)
            .and_then(|attempts| attempts.last())
        {
            view.your_option = Some(last.option_index);
            view.your_correct = last.is_correct;
        }
    }

    Some(view)
}
