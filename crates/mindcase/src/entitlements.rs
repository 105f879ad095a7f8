use chrono::Utc;
use entity::entitlement;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Entitlement ledger, driven by billing webhooks.
///
/// Webhooks arrive at-least-once and out of order, so grants are idempotent
/// upserts keyed by `(user_id, provider_subscription_id)` and revocations keep
/// the row as history instead of deleting it.

#[derive(Debug, Clone)]
pub struct EntitlementGrant {
    pub user_id: String,
    pub provider: String,
    pub provider_subscription_id: String,
    pub product_id: Option<String>,
    pub expires_at: i64,
}

/// Grant (or renew) an entitlement. Re-delivered and updated webhook events
/// land on the same row; the latest delivery wins.
pub async fn grant<C: ConnectionTrait>(
    conn: &C,
    grant: EntitlementGrant,
) -> anyhow::Result<entitlement::Model> {
    let now = Utc::now().timestamp();

    let existing = find_by_subscription(conn, &grant.user_id, &grant.provider_subscription_id)
        .await?;

    if let Some(row) = existing {
        let mut active: entitlement::ActiveModel = row.into();
        active.status = Set(entitlement::STATUS_ACTIVE.to_string());
        active.product_id = Set(grant.product_id.clone());
        active.expires_at = Set(grant.expires_at);
        active.updated_at = Set(now);
        return Ok(active.update(conn).await?);
    }

    let fresh = entitlement::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(grant.user_id.clone()),
        provider: Set(grant.provider.clone()),
        provider_subscription_id: Set(grant.provider_subscription_id.clone()),
        product_id: Set(grant.product_id.clone()),
        status: Set(entitlement::STATUS_ACTIVE.to_string()),
        expires_at: Set(grant.expires_at),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match fresh.insert(conn).await {
        Ok(model) => Ok(model),
        Err(err) => {
            // A concurrent delivery of the same subscription inserted first;
            // fall back to updating the winner's row.
            let msg = err.to_string().to_lowercase();
            if msg.contains("unique") || msg.contains("duplicate") {
                let row =
                    find_by_subscription(conn, &grant.user_id, &grant.provider_subscription_id)
                        .await?
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "Entitlement vanished after unique conflict for subscription {}",
                                grant.provider_subscription_id
                            )
                        })?;
                let mut active: entitlement::ActiveModel = row.into();
                active.status = Set(entitlement::STATUS_ACTIVE.to_string());
                active.product_id = Set(grant.product_id);
                active.expires_at = Set(grant.expires_at);
                active.updated_at = Set(now);
                Ok(active.update(conn).await?)
            } else {
                Err(err.into())
            }
        }
    }
}

/// Mark a subscription's entitlement revoked. Unknown subscriptions are a
/// no-op so webhook replays after cleanup stay harmless.
pub async fn revoke<C: ConnectionTrait>(
    conn: &C,
    provider: &str,
    provider_subscription_id: &str,
) -> anyhow::Result<()> {
    let existing = entitlement::Entity::find()
        .filter(entitlement::Column::Provider.eq(provider))
        .filter(entitlement::Column::ProviderSubscriptionId.eq(provider_subscription_id))
        .one(conn)
        .await?;

    if let Some(row) = existing {
        let mut active: entitlement::ActiveModel = row.into();
        active.status = Set(entitlement::STATUS_REVOKED.to_string());
        active.updated_at = Set(Utc::now().timestamp());
        active.update(conn).await?;
    }

    Ok(())
}

/// True when the user holds at least one active, unexpired entitlement.
pub async fn has_active_premium<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    now: i64,
) -> anyhow::Result<bool> {
    let found = entitlement::Entity::find()
        .filter(entitlement::Column::UserId.eq(user_id))
        .filter(entitlement::Column::Status.eq(entitlement::STATUS_ACTIVE))
        .filter(entitlement::Column::ExpiresAt.gt(now))
        .one(conn)
        .await?;

    Ok(found.is_some())
}

/// All currently active entitlements for a user, newest expiry first.
pub async fn active_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    now: i64,
) -> anyhow::Result<Vec<entitlement::Model>> {
    let rows = entitlement::Entity::find()
        .filter(entitlement::Column::UserId.eq(user_id))
        .filter(entitlement::Column::Status.eq(entitlement::STATUS_ACTIVE))
        .filter(entitlement::Column::ExpiresAt.gt(now))
        .order_by_desc(entitlement::Column::ExpiresAt)
        .all(conn)
        .await?;

    Ok(rows)
}

async fn find_by_subscription<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    provider_subscription_id: &str,
) -> anyhow::Result<Option<entitlement::Model>> {
    let row = entitlement::Entity::find()
        .filter(entitlement::Column::UserId.eq(user_id))
        .filter(entitlement::Column::ProviderSubscriptionId.eq(provider_subscription_id))
        .one(conn)
        .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db};

    fn test_grant(user_id: &str, sub_id: &str, expires_at: i64) -> EntitlementGrant {
        EntitlementGrant {
            user_id: user_id.to_string(),
            provider: "stripe".to_string(),
            provider_subscription_id: sub_id.to_string(),
            product_id: Some("premium_monthly".to_string()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_grant_is_idempotent_per_subscription() {
        let db = test_db().await;
        let user = seed_user(&db, "u-ent-1").await;
        let now = Utc::now().timestamp();

        let first = grant(&db, test_grant(&user.id, "sub_1", now + 100))
            .await
            .unwrap();
        let second = grant(&db, test_grant(&user.id, "sub_1", now + 2_000))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.expires_at, now + 2_000);

        let rows = entitlement::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_premium_check_respects_status_and_expiry() {
        let db = test_db().await;
        let user = seed_user(&db, "u-ent-2").await;
        let now = Utc::now().timestamp();

        assert!(!has_active_premium(&db, &user.id, now).await.unwrap());

        grant(&db, test_grant(&user.id, "sub_2", now + 3_600))
            .await
            .unwrap();
        assert!(has_active_premium(&db, &user.id, now).await.unwrap());

        // Expired rows do not count even while still "active".
        assert!(!has_active_premium(&db, &user.id, now + 7_200).await.unwrap());

        revoke(&db, "stripe", "sub_2").await.unwrap();
        assert!(!has_active_premium(&db, &user.id, now).await.unwrap());

        // History is kept, not deleted.
        let rows = entitlement::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, entitlement::STATUS_REVOKED);
    }

    #[tokio::test]
    async fn test_regrant_reactivates_a_revoked_subscription() {
        let db = test_db().await;
        let user = seed_user(&db, "u-ent-3").await;
        let now = Utc::now().timestamp();

        grant(&db, test_grant(&user.id, "sub_3", now + 100)).await.unwrap();
        revoke(&db, "stripe", "sub_3").await.unwrap();
        grant(&db, test_grant(&user.id, "sub_3", now + 500)).await.unwrap();

        assert!(has_active_premium(&db, &user.id, now).await.unwrap());
    }
}
