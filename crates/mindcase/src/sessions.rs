use chrono::Utc;
use entity::minigame_session;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

/// Minigame session ledger.
///
/// Rewards are only claimable through a server-issued session that completes
/// within a plausible time window, so a client cannot mint tokens by replaying
/// a completion or finishing instantly.

/// Completions faster than this are rejected as implausible.
pub const MIN_DURATION_SECS: i64 = 5;

/// Sessions expire this long after they start.
pub const MAX_DURATION_SECS: i64 = 600;

#[derive(Debug, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// The session transitioned to `completed`. The reward is claimable only
    /// when the submitted result reports success.
    Completed { can_claim_reward: bool },
    /// Unknown session id, or a session owned by another user.
    InvalidSession,
    /// The session already reached a terminal state.
    AlreadyUsed,
    /// Completion arrived after the expiry deadline.
    Expired,
    /// Completion arrived implausibly fast.
    TooFast,
}

/// Open a new session for the user.
pub async fn start<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    game_type: &str,
) -> anyhow::Result<minigame_session::Model> {
    let now = Utc::now().timestamp();

    let session = minigame_session::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(user_id.to_string()),
        game_type: Set(game_type.to_string()),
        status: Set(minigame_session::STATUS_ACTIVE.to_string()),
        started_at: Set(now),
        expires_at: Set(now + MAX_DURATION_SECS),
        result: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
    };

    Ok(session.insert(conn).await?)
}

/// Settle a session exactly once. The row is locked for the duration of the
/// check so a concurrent completion of the same session observes the terminal
/// state and reports `AlreadyUsed`.
pub async fn complete<C>(
    conn: &C,
    user_id: &str,
    session_id: &str,
    result: &serde_json::Value,
) -> anyhow::Result<CompleteOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let now = Utc::now().timestamp();
    let txn = conn.begin().await?;

    let session = minigame_session::Entity::find_by_id(session_id)
        .lock_exclusive()
        .one(&txn)
        .await?;

    let session = match session {
        Some(s) if s.user_id == user_id => s,
        // Sessions of other users are indistinguishable from unknown ids.
        _ => {
            txn.commit().await?;
            return Ok(CompleteOutcome::InvalidSession);
        }
    };

    if session.status != minigame_session::STATUS_ACTIVE {
        txn.commit().await?;
        return Ok(CompleteOutcome::AlreadyUsed);
    }

    if now > session.expires_at {
        settle(&txn, session, minigame_session::STATUS_EXPIRED, None, now).await?;
        txn.commit().await?;
        return Ok(CompleteOutcome::Expired);
    }

    if now - session.started_at < MIN_DURATION_SECS {
        settle(&txn, session, minigame_session::STATUS_REJECTED, None, now).await?;
        txn.commit().await?;
        return Ok(CompleteOutcome::TooFast);
    }

    let can_claim_reward = result.get("success").and_then(|v| v.as_bool()) == Some(true);
    settle(
        &txn,
        session,
        minigame_session::STATUS_COMPLETED,
        Some(result.to_string()),
        now,
    )
    .await?;
    txn.commit().await?;

    Ok(CompleteOutcome::Completed { can_claim_reward })
}

async fn settle<C: ConnectionTrait>(
    conn: &C,
    session: minigame_session::Model,
    status: &str,
    result: Option<String>,
    now: i64,
) -> anyhow::Result<()> {
    let mut active: minigame_session::ActiveModel = session.into();
    active.status = Set(status.to_string());
    active.result = Set(result);
    active.completed_at = Set(Some(now));
    active.update(conn).await?;
    Ok(())
}
