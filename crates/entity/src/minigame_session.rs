use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_EXPIRED: &str = "expired";
pub const STATUS_REJECTED: &str = "rejected";

/// A single game attempt. Transitions exactly once from `active` to a terminal
/// state; terminal states are re-validated under a row lock to prevent
/// double-claiming the reward.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "minigame_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    pub game_type: String,

    /// "active", "completed", "expired" or "rejected".
    pub status: String,

    /// Unix timestamp (seconds).
    pub started_at: i64,

    /// Unix timestamp (seconds). Completion after this point expires the session.
    pub expires_at: i64,

    /// JSON game result, stored on completion.
    pub result: Option<String>,

    /// Unix timestamp (seconds).
    pub completed_at: Option<i64>,

    /// Unix timestamp (seconds).
    pub created_at: i64,
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
