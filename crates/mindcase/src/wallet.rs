use chrono::Utc;
use entity::{wallet, wallet_transaction};
use mindcase_core::limits;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

/// Wallet Engine.
///
/// All balance mutations happen inside a transaction that locks the wallet row
/// (`SELECT ... FOR UPDATE`), so concurrent earn/spend calls for the same user
/// serialize and `balance == total_earned - total_spent` holds after every
/// mutation. Every mutation appends one immutable audit row.

pub const MAX_TRANSACTION_PAGE: u64 = 100;

/// Earn sources. Only minigame rewards count toward (and are constrained by)
/// the per-account daily limit; the branching is on this explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarnSource {
    Minigame,
    Ad,
    Bonus,
}

impl EarnSource {
    pub fn tx_type(self) -> &'static str {
        match self {
            EarnSource::Minigame => "EARN_MINIGAME",
            EarnSource::Ad => "EARN_AD",
            EarnSource::Bonus => "EARN_BONUS",
        }
    }

    pub fn daily_limited(self) -> bool {
        matches!(self, EarnSource::Minigame)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletView {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub tokens_earned_today: i64,
}

impl From<&wallet::Model> for WalletView {
    fn from(w: &wallet::Model) -> Self {
        WalletView {
            balance: w.balance,
            total_earned: w.total_earned,
            total_spent: w.total_spent,
            tokens_earned_today: w.tokens_earned_today,
        }
    }
}

#[derive(Debug)]
pub enum EarnOutcome {
    Credited { credited: i64, wallet: WalletView },
    DailyLimitReached { tokens_earned_today: i64 },
}

#[derive(Debug)]
pub enum SpendOutcome {
    Spent { wallet: WalletView },
    InsufficientBalance { balance: i64 },
}

/// Map a caller-supplied spend purpose to an audit `tx_type`.
/// Rejects anything but short lowercase identifiers.
pub fn spend_tx_type(purpose: &str) -> Option<String> {
    if purpose.is_empty()
        || purpose.len() > 32
        || !purpose.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
    {
        return None;
    }
    Some(format!("SPEND_{}", purpose.to_ascii_uppercase()))
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Insert a zero-balance wallet if none exists. Racing inserts resolve via the
/// primary-key conflict; callers reselect afterwards.
async fn ensure_wallet<C: ConnectionTrait>(conn: &C, user_id: &str) -> anyhow::Result<()> {
    let now = Utc::now().timestamp();
    let fresh = wallet::ActiveModel {
        user_id: Set(user_id.to_string()),
        balance: Set(0),
        total_earned: Set(0),
        total_spent: Set(0),
        tokens_earned_today: Set(0),
        last_reset_date: Set(today_utc()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    wallet::Entity::insert(fresh)
        .on_conflict(
            OnConflict::column(wallet::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

async fn lock_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> anyhow::Result<wallet::Model> {
    wallet::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Wallet row missing after upsert for user {user_id}"))
}

/// Fetch the user's wallet, creating it on first use and persisting the daily
/// reset when the stored reset date is stale.
pub async fn get_or_create<C>(conn: &C, user_id: &str) -> anyhow::Result<WalletView>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = conn.begin().await?;

    ensure_wallet(&txn, user_id).await?;
    let wallet = lock_wallet(&txn, user_id).await?;

    let today = today_utc();
    let wallet = if wallet.last_reset_date != today {
        let mut active: wallet::ActiveModel = wallet.into();
        active.tokens_earned_today = Set(0);
        active.last_reset_date = Set(today);
        active.updated_at = Set(Utc::now().timestamp());
        active.update(&txn).await?
    } else {
        wallet
    };

    let view = WalletView::from(&wallet);
    txn.commit().await?;
    Ok(view)
}

/// Credit tokens. Minigame earns are capped per account-day (partial credit up
/// to the remaining allowance); other sources credit in full. The premium
/// entitlement check runs inside the same transaction as the mutation.
pub async fn earn<C>(
    conn: &C,
    user_id: &str,
    amount: i64,
    source: EarnSource,
    metadata: Option<serde_json::Value>,
) -> anyhow::Result<EarnOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    anyhow::ensure!(amount > 0, "earn amount must be positive, got {amount}");

    let now = Utc::now().timestamp();
    let today = today_utc();

    let txn = conn.begin().await?;

    ensure_wallet(&txn, user_id).await?;
    let wallet = lock_wallet(&txn, user_id).await?;

    let earned_today = if wallet.last_reset_date == today {
        wallet.tokens_earned_today
    } else {
        0
    };

    let credited = if source.daily_limited() {
        let premium = crate::entitlements::has_active_premium(&txn, user_id, now).await?;
        let remaining = limits::remaining_today(premium, earned_today);
        if remaining == 0 {
            txn.commit().await?;
            return Ok(EarnOutcome::DailyLimitReached {
                tokens_earned_today: earned_today,
            });
        }
        amount.min(remaining)
    } else {
        amount
    };

    let new_balance = wallet.balance + credited;
    let new_total_earned = wallet.total_earned + credited;
    let new_earned_today = if source.daily_limited() {
        earned_today + credited
    } else {
        earned_today
    };
    let total_spent = wallet.total_spent;

    let mut active: wallet::ActiveModel = wallet.into();
    active.balance = Set(new_balance);
    active.total_earned = Set(new_total_earned);
    active.tokens_earned_today = Set(new_earned_today);
    active.last_reset_date = Set(today);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    append_audit_row(&txn, user_id, source.tx_type(), credited, new_balance, metadata).await?;

    txn.commit().await?;

    Ok(EarnOutcome::Credited {
        credited,
        wallet: WalletView {
            balance: new_balance,
            total_earned: new_total_earned,
            total_spent,
            tokens_earned_today: new_earned_today,
        },
    })
}

/// Debit tokens. Fails with `InsufficientBalance` before any mutation; the
/// balance can never go negative.
pub async fn spend<C>(
    conn: &C,
    user_id: &str,
    amount: i64,
    tx_type: &str,
    metadata: Option<serde_json::Value>,
) -> anyhow::Result<SpendOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    anyhow::ensure!(amount > 0, "spend amount must be positive, got {amount}");

    let now = Utc::now().timestamp();
    let txn = conn.begin().await?;

    ensure_wallet(&txn, user_id).await?;
    let wallet = lock_wallet(&txn, user_id).await?;

    if wallet.balance < amount {
        let balance = wallet.balance;
        txn.commit().await?;
        return Ok(SpendOutcome::InsufficientBalance { balance });
    }

    let new_balance = wallet.balance - amount;
    let new_total_spent = wallet.total_spent + amount;
    let total_earned = wallet.total_earned;
    let tokens_earned_today = wallet.tokens_earned_today;

    let mut active: wallet::ActiveModel = wallet.into();
    active.balance = Set(new_balance);
    active.total_spent = Set(new_total_spent);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    append_audit_row(&txn, user_id, tx_type, -amount, new_balance, metadata).await?;

    txn.commit().await?;

    Ok(SpendOutcome::Spent {
        wallet: WalletView {
            balance: new_balance,
            total_earned,
            total_spent: new_total_spent,
            tokens_earned_today,
        },
    })
}

/// Read-only audit listing, newest first. Takes no lock; slightly stale reads
/// are acceptable for an informational endpoint.
pub async fn transactions<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    limit: u64,
) -> anyhow::Result<Vec<wallet_transaction::Model>> {
    let limit = limit.clamp(1, MAX_TRANSACTION_PAGE);

    let rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(user_id))
        .order_by_desc(wallet_transaction::Column::CreatedAt)
        .order_by_desc(wallet_transaction::Column::Id)
        .limit(limit)
        .all(conn)
        .await?;

    Ok(rows)
}

async fn append_audit_row<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    tx_type: &str,
    amount: i64,
    balance_after: i64,
    metadata: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    let row = wallet_transaction::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(user_id.to_string()),
        tx_type: Set(tx_type.to_string()),
        amount: Set(amount),
        balance_after: Set(balance_after),
        metadata: Set(metadata.map(|m| m.to_string())),
        created_at: Set(Utc::now().timestamp()),
    };
    row.insert(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db};
    use mindcase_core::limits::FREE_DAILY_EARN_CAP;
    use sea_orm::sea_query::Expr;

    /// Force the wallet's daily counter and reset date.
    async fn force_daily_state<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        tokens_earned_today: i64,
        last_reset_date: &str,
    ) -> anyhow::Result<()> {
        wallet::Entity::update_many()
            .col_expr(
                wallet::Column::TokensEarnedToday,
                Expr::value(tokens_earned_today),
            )
            .col_expr(wallet::Column::LastResetDate, Expr::value(last_reset_date))
            .filter(wallet::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_earn_and_spend_keep_balance_invariant() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-1").await;

        let outcome = earn(&db, &user.id, 10, EarnSource::Bonus, None)
            .await
            .unwrap();
        let wallet = match outcome {
            EarnOutcome::Credited { credited, wallet } => {
                assert_eq!(credited, 10);
                wallet
            }
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(wallet.balance, wallet.total_earned - wallet.total_spent);

        let outcome = spend(&db, &user.id, 4, "SPEND_UNLOCK", None).await.unwrap();
        let wallet = match outcome {
            SpendOutcome::Spent { wallet } => wallet,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(wallet.balance, 6);
        assert_eq!(wallet.total_earned, 10);
        assert_eq!(wallet.total_spent, 4);
        assert_eq!(wallet.balance, wallet.total_earned - wallet.total_spent);

        let rows = transactions(&db, &user.id, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].tx_type, "SPEND_UNLOCK");
        assert_eq!(rows[0].amount, -4);
        assert_eq!(rows[0].balance_after, 6);
        assert_eq!(rows[1].tx_type, "EARN_BONUS");
        assert_eq!(rows[1].amount, 10);
        assert_eq!(rows[1].balance_after, 10);
    }

    #[tokio::test]
    async fn test_spend_rejects_insufficient_balance_without_mutation() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-2").await;

        earn(&db, &user.id, 2, EarnSource::Bonus, None).await.unwrap();

        let outcome = spend(&db, &user.id, 5, "SPEND_UNLOCK", None).await.unwrap();
        match outcome {
            SpendOutcome::InsufficientBalance { balance } => assert_eq!(balance, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let wallet = get_or_create(&db, &user.id).await.unwrap();
        assert_eq!(wallet.balance, 2);
        // The failed spend must not have produced an audit row.
        assert_eq!(transactions(&db, &user.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_minigame_earns_hit_the_daily_limit() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-3").await;

        let outcome = earn(
            &db,
            &user.id,
            FREE_DAILY_EARN_CAP,
            EarnSource::Minigame,
            None,
        )
        .await
        .unwrap();
        match outcome {
            EarnOutcome::Credited { credited, .. } => assert_eq!(credited, FREE_DAILY_EARN_CAP),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let outcome = earn(&db, &user.id, 1, EarnSource::Minigame, None)
            .await
            .unwrap();
        match outcome {
            EarnOutcome::DailyLimitReached {
                tokens_earned_today,
            } => assert_eq!(tokens_earned_today, FREE_DAILY_EARN_CAP),
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Balance unchanged by the rejected earn.
        let wallet = get_or_create(&db, &user.id).await.unwrap();
        assert_eq!(wallet.balance, FREE_DAILY_EARN_CAP);

        // Ad earns are not daily-limited and still credit in full.
        let outcome = earn(&db, &user.id, 5, EarnSource::Ad, None).await.unwrap();
        match outcome {
            EarnOutcome::Credited { credited, wallet } => {
                assert_eq!(credited, 5);
                assert_eq!(wallet.balance, FREE_DAILY_EARN_CAP + 5);
                assert_eq!(wallet.tokens_earned_today, FREE_DAILY_EARN_CAP);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_minigame_earn_is_partially_credited_near_the_cap() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-4").await;

        earn(
            &db,
            &user.id,
            FREE_DAILY_EARN_CAP - 2,
            EarnSource::Minigame,
            None,
        )
        .await
        .unwrap();

        let outcome = earn(&db, &user.id, 5, EarnSource::Minigame, None)
            .await
            .unwrap();
        match outcome {
            EarnOutcome::Credited { credited, wallet } => {
                assert_eq!(credited, 2);
                assert_eq!(wallet.tokens_earned_today, FREE_DAILY_EARN_CAP);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_daily_counter_resets_on_a_new_day() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-5").await;

        earn(&db, &user.id, 1, EarnSource::Minigame, None).await.unwrap();
        force_daily_state(&db, &user.id, FREE_DAILY_EARN_CAP, "2000-01-01")
            .await
            .unwrap();

        let outcome = earn(&db, &user.id, 3, EarnSource::Minigame, None)
            .await
            .unwrap();
        match outcome {
            EarnOutcome::Credited { credited, wallet } => {
                assert_eq!(credited, 3);
                assert_eq!(wallet.tokens_earned_today, 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_premium_lifts_the_daily_cap() {
        let db = test_db().await;
        let user = seed_user(&db, "u-wallet-6").await;
        crate::test_util::seed_premium(&db, &user.id).await;

        let outcome = earn(
            &db,
            &user.id,
            FREE_DAILY_EARN_CAP * 10,
            EarnSource::Minigame,
            None,
        )
        .await
        .unwrap();
        match outcome {
            EarnOutcome::Credited { credited, .. } => {
                assert_eq!(credited, FREE_DAILY_EARN_CAP * 10)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_spend_tx_type_mapping() {
        assert_eq!(spend_tx_type("unlock").as_deref(), Some("SPEND_UNLOCK"));
        assert_eq!(spend_tx_type("hint").as_deref(), Some("SPEND_HINT"));
        assert!(spend_tx_type("").is_none());
        assert!(spend_tx_type("DROP TABLE").is_none());
        assert!(spend_tx_type(&"x".repeat(40)).is_none());
    }
}
