use sea_orm::entity::prelude::*;

/// Durable record of one game session. Outlives the in-memory room;
/// `final_standings` is filled in (as JSON text) at finalization.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "game_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub quiz_id: String,
    pub host_id: String,
    pub team_id: Option<String>,
    pub join_code: String,
    /// "active" or "completed".
    pub status: String,
    pub final_standings: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
