use quiz_types::{AnswerAttempt, UserId};
use std::collections::HashMap;

/// Points earned for a correct answer: faster answers earn up to double
/// the base value at full time remaining, tapering to the base value at
/// zero remaining. A non-positive time allowance short-circuits to the
/// base value.
pub fn score_for_answer(base_points: i32, time_allowed_seconds: u32, remaining_seconds: f64) -> i32 {
    if time_allowed_seconds == 0 {
        return base_points;
    }
    let bonus_ratio = remaining_seconds / time_allowed_seconds as f64;
    (base_points as f64 * (1.0 + bonus_ratio)).round() as i32
}

/// Per-option tally over each participant's last attempt. Every
/// submitter is counted exactly once; options outside the question's
/// range are ignored.
pub fn tally_last_attempts(
    answers: &HashMap<UserId, Vec<AnswerAttempt>>,
    option_count: usize,
) -> Vec<u32> {
    let mut counts = vec![0u32; option_count];
    for attempts in answers.values() {
        if let Some(last) = attempts.last() {
            if let Some(slot) = counts.get_mut(last.option_index) {
                *slot += 1;
            }
        }
    }
    counts
}
