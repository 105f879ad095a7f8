use chrono::Utc;
use entity::unlocked_content;
use mindcase_core::pricing;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::wallet::{self, SpendOutcome};

/// Content unlock gate.
///
/// Charging the wallet and recording the unlock happen in one transaction, so
/// a user is never charged without receiving the unlock and never receives it
/// without paying. Unlocks are permanent and priced server-side.

#[derive(Debug)]
pub enum UnlockOutcome {
    Unlocked { balance: i64, tokens_spent: i64 },
    AlreadyUnlocked { balance: i64 },
    InsufficientBalance { balance: i64 },
    UnknownContentType,
}

pub async fn unlock<C>(
    conn: &C,
    user_id: &str,
    content_type: &str,
    content_id: &str,
) -> anyhow::Result<UnlockOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let cost = match pricing::content_cost(content_type) {
        Some(cost) => cost,
        None => return Ok(UnlockOutcome::UnknownContentType),
    };

    let txn = conn.begin().await?;

    let existing = find_unlock(&txn, user_id, content_type, content_id).await?;
    if existing.is_some() {
        let balance = wallet::get_or_create(&txn, user_id).await?.balance;
        txn.commit().await?;
        return Ok(UnlockOutcome::AlreadyUnlocked { balance });
    }

    match charge_and_record(&txn, user_id, content_type, content_id, cost).await? {
        ChargeOutcome::Charged { balance } => {
            txn.commit().await?;
            Ok(UnlockOutcome::Unlocked {
                balance,
                tokens_spent: cost,
            })
        }
        ChargeOutcome::Insufficient { balance } => {
            txn.commit().await?;
            Ok(UnlockOutcome::InsufficientBalance { balance })
        }
        ChargeOutcome::LostRace => {
            // A concurrent request won the unlock; roll back so this
            // request's debit never lands.
            txn.rollback().await?;
            let balance = wallet::get_or_create(conn, user_id).await?.balance;
            Ok(UnlockOutcome::AlreadyUnlocked { balance })
        }
    }
}

#[derive(Debug)]
enum ChargeOutcome {
    Charged { balance: i64 },
    Insufficient { balance: i64 },
    /// The unlock row already existed at insert time. The debit is pending in
    /// the caller's transaction; the caller must roll back.
    LostRace,
}

/// Debit the wallet and record the unlock inside the caller's transaction.
async fn charge_and_record<C>(
    txn: &C,
    user_id: &str,
    content_type: &str,
    content_id: &str,
    cost: i64,
) -> anyhow::Result<ChargeOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let metadata = serde_json::json!({
        "contentType": content_type,
        "contentId": content_id,
    });
    let balance = match wallet::spend(txn, user_id, cost, "SPEND_UNLOCK", Some(metadata)).await? {
        SpendOutcome::Spent { wallet } => wallet.balance,
        SpendOutcome::InsufficientBalance { balance } => {
            return Ok(ChargeOutcome::Insufficient { balance });
        }
    };

    let row = unlocked_content::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(user_id.to_string()),
        content_type: Set(content_type.to_string()),
        content_id: Set(content_id.to_string()),
        tokens_spent: Set(cost),
        unlocked_at: Set(Utc::now().timestamp()),
    };
    let inserted = unlocked_content::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                unlocked_content::Column::UserId,
                unlocked_content::Column::ContentType,
                unlocked_content::Column::ContentId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    if inserted == 0 {
        return Ok(ChargeOutcome::LostRace);
    }

    Ok(ChargeOutcome::Charged { balance })
}

/// Access check: premium grants everything, otherwise a recorded unlock is
/// required.
pub async fn has_access<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    content_type: &str,
    content_id: &str,
) -> anyhow::Result<bool> {
    let now = Utc::now().timestamp();
    if crate::entitlements::has_active_premium(conn, user_id, now).await? {
        return Ok(true);
    }
    Ok(find_unlock(conn, user_id, content_type, content_id)
        .await?
        .is_some())
}

pub async fn list<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> anyhow::Result<Vec<unlocked_content::Model>> {
    let rows = unlocked_content::Entity::find()
        .filter(unlocked_content::Column::UserId.eq(user_id))
        .order_by_desc(unlocked_content::Column::UnlockedAt)
        .all(conn)
        .await?;
    Ok(rows)
}

async fn find_unlock<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    content_type: &str,
    content_id: &str,
) -> anyhow::Result<Option<unlocked_content::Model>> {
    let row = unlocked_content::Entity::find()
        .filter(unlocked_content::Column::UserId.eq(user_id))
        .filter(unlocked_content::Column::ContentType.eq(content_type))
        .filter(unlocked_content::Column::ContentId.eq(content_id))
        .one(conn)
        .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_premium, seed_user, test_db};
    use crate::wallet::EarnSource;
    use sea_orm::ActiveModelTrait;

    #[tokio::test]
    async fn test_unlock_charges_exactly_once() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-1").await;
        wallet::earn(&db, &user.id, 25, EarnSource::Bonus, None)
            .await
            .unwrap();

        let outcome = unlock(&db, &user.id, "hint", "case-7").await.unwrap();
        match outcome {
            UnlockOutcome::Unlocked {
                balance,
                tokens_spent,
            } => {
                assert_eq!(tokens_spent, 10);
                assert_eq!(balance, 15);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Repeating the unlock must not charge again.
        let outcome = unlock(&db, &user.id, "hint", "case-7").await.unwrap();
        match outcome {
            UnlockOutcome::AlreadyUnlocked { balance } => assert_eq!(balance, 15),
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(list(&db, &user.id).await.unwrap().len(), 1);
    }

    /// Two requests can both pass the existence check before either commits;
    /// the loser's insert affects zero rows and its debit must roll back.
    #[tokio::test]
    async fn test_losing_the_insert_race_refunds_the_debit() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-5").await;
        wallet::earn(&db, &user.id, 25, EarnSource::Bonus, None)
            .await
            .unwrap();

        // The other request commits the same unlock first.
        unlocked_content::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            user_id: Set(user.id.clone()),
            content_type: Set("hint".to_string()),
            content_id: Set("case-9".to_string()),
            tokens_spent: Set(10),
            unlocked_at: Set(Utc::now().timestamp()),
        }
        .insert(&db)
        .await
        .unwrap();

        let txn = db.begin().await.unwrap();
        let outcome = charge_and_record(&txn, &user.id, "hint", "case-9", 10)
            .await
            .unwrap();
        assert!(matches!(outcome, ChargeOutcome::LostRace));
        txn.rollback().await.unwrap();

        let view = wallet::get_or_create(&db, &user.id).await.unwrap();
        assert_eq!(view.balance, 25);
        assert_eq!(view.total_spent, 0);
        assert_eq!(list(&db, &user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_simultaneous_unlocks_charge_once() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-6").await;
        wallet::earn(&db, &user.id, 25, EarnSource::Bonus, None)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            unlock(&db, &user.id, "hint", "case-10"),
            unlock(&db, &user.id, "hint", "case-10"),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let unlocked = outcomes
            .iter()
            .filter(|o| matches!(o, UnlockOutcome::Unlocked { .. }))
            .count();
        let already = outcomes
            .iter()
            .filter(|o| matches!(o, UnlockOutcome::AlreadyUnlocked { .. }))
            .count();
        assert_eq!(unlocked, 1);
        assert_eq!(already, 1);

        let view = wallet::get_or_create(&db, &user.id).await.unwrap();
        assert_eq!(view.balance, 15);
        assert_eq!(list(&db, &user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unlock_refuses_without_balance() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-2").await;
        wallet::earn(&db, &user.id, 5, EarnSource::Bonus, None)
            .await
            .unwrap();

        let outcome = unlock(&db, &user.id, "solution", "case-7").await.unwrap();
        match outcome {
            UnlockOutcome::InsufficientBalance { balance } => assert_eq!(balance, 5),
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(!has_access(&db, &user.id, "solution", "case-7").await.unwrap());
        assert!(list(&db, &user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_rejected_before_charging() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-3").await;
        wallet::earn(&db, &user.id, 100, EarnSource::Bonus, None)
            .await
            .unwrap();

        let outcome = unlock(&db, &user.id, "mystery_box", "x").await.unwrap();
        assert!(matches!(outcome, UnlockOutcome::UnknownContentType));

        let view = wallet::get_or_create(&db, &user.id).await.unwrap();
        assert_eq!(view.balance, 100);
    }

    #[tokio::test]
    async fn test_premium_grants_access_without_an_unlock() {
        let db = test_db().await;
        let user = seed_user(&db, "u-unl-4").await;

        assert!(!has_access(&db, &user.id, "case_pack", "pack-1").await.unwrap());
        seed_premium(&db, &user.id).await;
        assert!(has_access(&db, &user.id, "case_pack", "pack-1").await.unwrap());
    }
}
