use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One wallet per user. `balance == total_earned - total_spent` at all times,
/// enforced by mutating exclusively inside row-locked transactions.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    pub balance: i64,

    pub total_earned: i64,

    pub total_spent: i64,

    /// Tokens earned today from daily-limited sources. Reset when
    /// `last_reset_date` is not the current date.
    pub tokens_earned_today: i64,

    /// UTC date of the last daily reset, as "YYYY-MM-DD".
    pub last_reset_date: String,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
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
