use anyhow::Result;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{prelude::*, team_members};

pub struct TeamRepository {
    db: DatabaseConnection,
}

impl TeamRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn is_member(&self, team_id: &str, user_id: &str) -> Result<bool> {
        let found = TeamMembers::find()
            .filter(team_members::Column::TeamId.eq(team_id))
            .filter(team_members::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    pub async fn add_member(&self, team_id: &str, user_id: &str) -> Result<()> {
        let member = team_members::ActiveModel {
            team_id: ActiveValue::Set(team_id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        TeamMembers::insert(member).exec(&self.db).await?;
        Ok(())
    }
}
