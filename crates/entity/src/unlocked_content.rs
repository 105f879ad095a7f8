use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permanent content unlocks. `(user_id, content_type, content_id)` is unique;
/// insertion is idempotent (conflict is a no-op).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "unlocked_content")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    pub content_type: String,

    pub content_id: String,

    pub tokens_spent: i64,

    /// Unix timestamp (seconds).
    pub unlocked_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
