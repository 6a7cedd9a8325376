use anyhow::Result;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::entities::{game_sessions, prelude::*};
use quiz_types::FinalStanding;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";

pub struct SessionRepository {
    db: DatabaseConnection,
}

impl SessionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_session(
        &self,
        id: Uuid,
        quiz_id: &str,
        host_id: &str,
        team_id: Option<&str>,
        join_code: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().into();
        let session = game_sessions::ActiveModel {
            id: ActiveValue::Set(id),
            quiz_id: ActiveValue::Set(quiz_id.to_string()),
            host_id: ActiveValue::Set(host_id.to_string()),
            team_id: ActiveValue::Set(team_id.map(str::to_string)),
            join_code: ActiveValue::Set(join_code.to_string()),
            status: ActiveValue::Set(STATUS_ACTIVE.to_string()),
            final_standings: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        GameSessions::insert(session).exec(&self.db).await?;
        Ok(())
    }

    pub async fn find_session(&self, id: Uuid) -> Result<Option<game_sessions::Model>> {
        Ok(GameSessions::find_by_id(id).one(&self.db).await?)
    }

    /// Marks the session terminal and stores the final standings.
    pub async fn finalize_session(&self, id: Uuid, standings: &[FinalStanding]) -> Result<()> {
        let session = GameSessions::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("game session {id} not found"))?;

        let updated = game_sessions::ActiveModel {
            id: ActiveValue::Unchanged(session.id),
            quiz_id: ActiveValue::Unchanged(session.quiz_id),
            host_id: ActiveValue::Unchanged(session.host_id),
            team_id: ActiveValue::Unchanged(session.team_id),
            join_code: ActiveValue::Unchanged(session.join_code),
            status: ActiveValue::Set(STATUS_COMPLETED.to_string()),
            final_standings: ActiveValue::Set(Some(serde_json::to_string(standings)?)),
            created_at: ActiveValue::Unchanged(session.created_at),
            updated_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        GameSessions::update(updated).exec(&self.db).await?;
        Ok(())
    }

    /// Reverts a finalized session to active; used by play-again, which
    /// restarts the game under the same session id.
    pub async fn reopen_session(&self, id: Uuid) -> Result<()> {
        let session = GameSessions::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("game session {id} not found"))?;

        let updated = game_sessions::ActiveModel {
            id: ActiveValue::Unchanged(session.id),
            quiz_id: ActiveValue::Unchanged(session.quiz_id),
            host_id: ActiveValue::Unchanged(session.host_id),
            team_id: ActiveValue::Unchanged(session.team_id),
            join_code: ActiveValue::Unchanged(session.join_code),
            status: ActiveValue::Set(STATUS_ACTIVE.to_string()),
            final_standings: ActiveValue::Set(None),
            created_at: ActiveValue::Unchanged(session.created_at),
            updated_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        GameSessions::update(updated).exec(&self.db).await?;
        Ok(())
    }
}
