use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};

use crate::entities::{active_rooms, prelude::*};

/// Write-through store for live rooms. One row per join code, upserted
/// after every mutating room operation and deleted on room removal.
pub struct MirrorRepository {
    db: DatabaseConnection,
}

impl MirrorRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn save(&self, join_code: &str, payload: &serde_json::Value) -> Result<()> {
        let row = active_rooms::ActiveModel {
            join_code: ActiveValue::Set(join_code.to_string()),
            payload: ActiveValue::Set(payload.to_string()),
            updated_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        ActiveRooms::insert(row)
            .on_conflict(
                OnConflict::column(active_rooms::Column::JoinCode)
                    .update_columns([
                        active_rooms::Column::Payload,
                        active_rooms::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn load(&self, join_code: &str) -> Result<Option<serde_json::Value>> {
        let Some(row) = ActiveRooms::find_by_id(join_code.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&row.payload)?))
    }

    pub async fn delete(&self, join_code: &str) -> Result<()> {
        ActiveRooms::delete_by_id(join_code.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
