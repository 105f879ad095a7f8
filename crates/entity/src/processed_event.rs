use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable idempotency keys for at-least-once external callbacks (ad reward
/// callbacks, Stripe webhook events). `(provider, event_id)` is unique; a
/// failed insert means the event was already processed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "processed_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Event source ("ad", "stripe").
    pub provider: String,

    /// Provider-scoped event or transaction id.
    pub event_id: String,

    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
