use sea_orm::entity::prelude::*;

/// One participant's record for one completed round. `attempts` holds
/// the full attempt list for the question as JSON text.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "round_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_index: i32,
    pub user_id: String,
    pub attempts: String,
    pub was_correct: bool,
    pub score_delta: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
