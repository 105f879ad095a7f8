use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only wallet audit log. One row per balance mutation;
/// `balance_after` must equal the wallet balance right after the mutation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// "EARN_MINIGAME", "EARN_AD", "EARN_BONUS", "SPEND_UNLOCK", "SPEND_HINT".
    pub tx_type: String,

    /// Signed amount: positive for earns, negative for spends.
    pub amount: i64,

    pub balance_after: i64,

    /// Optional JSON metadata (session id, content key, ad transaction id, ...).
    pub metadata: Option<String>,

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
