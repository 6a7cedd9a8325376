use sea_orm::entity::prelude::*;

/// Durable mirror of a live room, keyed by join code. `payload` is the
/// flat-serialized room JSON; the in-process cache stays authoritative
/// while the room is live.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "active_rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub join_code: String,
    pub payload: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
