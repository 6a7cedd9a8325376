use anyhow::Result;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;
use uuid::Uuid;

use crate::entities::{prelude::*, round_history};
use quiz_types::AnswerAttempt;

/// One participant's answer record for a completed round.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub user_id: String,
    pub attempts: Vec<AnswerAttempt>,
    pub was_correct: bool,
    pub score_delta: i32,
}

pub struct HistoryRepository {
    db: DatabaseConnection,
}

impl HistoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Best-effort batch insert. A record that fails to serialize or
    /// insert is logged and skipped; the rest of the batch proceeds.
    /// Returns the number of records actually written.
    pub async fn save_round(
        &self,
        session_id: Uuid,
        question_index: i32,
        records: &[RoundRecord],
    ) -> Result<usize> {
        let mut written = 0;
        for record in records {
            let attempts = match serde_json::to_string(&record.attempts) {
                Ok(json) => json,
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        user_id = %record.user_id,
                        "Failed to serialize round attempts: {}", e
                    );
                    continue;
                }
            };

            let row = round_history::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                session_id: ActiveValue::Set(session_id),
                question_index: ActiveValue::Set(question_index),
                user_id: ActiveValue::Set(record.user_id.clone()),
                attempts: ActiveValue::Set(attempts),
                was_correct: ActiveValue::Set(record.was_correct),
                score_delta: ActiveValue::Set(record.score_delta),
                created_at: ActiveValue::Set(chrono::Utc::now().into()),
            };

            match RoundHistory::insert(row).exec(&self.db).await {
                Ok(_) => written += 1,
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        user_id = %record.user_id,
                        "Failed to insert round history record: {}", e
                    );
                }
            }
        }
        Ok(written)
    }

    /// All history rows for a session, ordered by question then user.
    pub async fn find_by_session(&self, session_id: Uuid) -> Result<Vec<round_history::Model>> {
        Ok(RoundHistory::find()
            .filter(round_history::Column::SessionId.eq(session_id))
            .order_by_asc(round_history::Column::QuestionIndex)
            .order_by_asc(round_history::Column::UserId)
            .all(&self.db)
            .await?)
    }
}
