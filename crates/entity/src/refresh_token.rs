use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Opaque refresh tokens, stored hashed. Within a family at most one token is
/// live (neither revoked nor replaced); rotation revokes the old row and links
/// it to its successor via `replaced_by_token_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// SHA-256 hash of the refresh token. The raw token is never stored.
    #[sea_orm(unique)]
    pub token_hash: String,

    /// Token family id for rotation tracking; one family per login session.
    pub family_id: String,

    /// Unix timestamp (seconds).
    pub expires_at: i64,

    pub revoked: bool,

    /// Set when this token was consumed by a rotation. A lookup that finds this
    /// set is a reuse of a consumed token.
    pub replaced_by_token_id: Option<String>,

    /// Free-form device metadata (user agent) captured at issue time.
    pub device_info: Option<String>,

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
