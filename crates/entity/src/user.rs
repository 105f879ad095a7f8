use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role strings stored in `users.role`.
pub const ROLE_GUEST: &str = "GUEST";
pub const ROLE_USER: &str = "USER";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// NULL for guest and social-only accounts.
    #[sea_orm(unique)]
    pub email: Option<String>,

    /// Argon2id PHC string. NULL for guest and social-only accounts.
    pub password_hash: Option<String>,

    pub name: Option<String>,

    /// "GUEST" or "USER". Guests are upgraded in place on registration.
    pub role: String,

    /// Google account id (subject), when the Google identity is linked.
    #[sea_orm(unique)]
    pub google_id: Option<String>,

    /// GitHub numeric user id as a string, when the GitHub identity is linked.
    #[sea_orm(unique)]
    pub github_id: Option<String>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

impl Model {
    pub fn is_guest(&self) -> bool {
        self.role == ROLE_GUEST
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
