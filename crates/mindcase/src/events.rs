use chrono::Utc;
use entity::processed_event;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, Set};
use uuid::Uuid;

/// Durable idempotency ledger for at-least-once external callbacks.
///
/// Claims survive restarts and are shared across instances because they live
/// in the database, inside the caller's transaction when one is supplied.

/// Atomically claim `(provider, event_id)`. Returns `true` when this call won
/// the claim and the caller should process the event, `false` when the event
/// was already processed (or is being processed concurrently).
pub async fn claim<C: ConnectionTrait>(
    conn: &C,
    provider: &str,
    event_id: &str,
) -> anyhow::Result<bool> {
    let row = processed_event::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        provider: Set(provider.to_string()),
        event_id: Set(event_id.to_string()),
        created_at: Set(Utc::now().timestamp()),
    };

    let result = processed_event::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                processed_event::Column::Provider,
                processed_event::Column::EventId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(result > 0)
}
