use chrono::Utc;
use entity::{refresh_token, user};
use jsonwebtoken::{encode, Algorithm, Header};
use mindcase_core::token::{generate_opaque_token, hash_token};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::AccessClaims;

/// Token issuance and refresh rotation.
///
/// Access tokens are short-lived HS256 JWTs. Refresh tokens are opaque random
/// strings stored as SHA-256 hashes and grouped into families, one family per
/// login session. Each refresh consumes the presented token and issues a
/// successor in the same family; presenting a consumed token is treated as
/// theft and revokes the whole family.

/// JWT audience claim for tokens issued to the web client.
pub const AUDIENCE: &str = "mindcase-web";

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_id: String,
    pub family_id: String,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Rotated {
        tokens: IssuedTokens,
        user: user::Model,
    },
    /// The presented token hash matches no row.
    InvalidToken,
    /// The presented token was already consumed or revoked; the family has
    /// been revoked in response.
    ReuseDetected,
    /// The presented token is live but past its expiry.
    Expired,
}

pub fn generate_access_token(state: &AppState, user: &user::Model) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();

    let claims = AccessClaims {
        iss: state.issuer.clone(),
        sub: user.id.clone(),
        aud: AUDIENCE.to_string(),
        exp: now + state.access_token_expiration,
        iat: now,
        token_type: "access".to_string(),
        role: user.role.clone(),
        is_guest: user.is_guest(),
        email: user.email.clone(),
        name: user.name.clone(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &state.encoding_key,
    )?;
    Ok(token)
}

/// Issue an access/refresh pair. A fresh family id is minted for new login
/// sessions; rotation passes the existing family through.
pub async fn issue_pair<C: ConnectionTrait>(
    conn: &C,
    state: &AppState,
    user: &user::Model,
    family_id: Option<String>,
    device_info: Option<String>,
) -> anyhow::Result<IssuedTokens> {
    let now = Utc::now().timestamp();
    let raw = generate_opaque_token();
    let id = Uuid::now_v7().to_string();
    let family_id = family_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let row = refresh_token::ActiveModel {
        id: Set(id.clone()),
        user_id: Set(user.id.clone()),
        token_hash: Set(hash_token(&raw)),
        family_id: Set(family_id.clone()),
        expires_at: Set(now + state.refresh_token_expiration),
        revoked: Set(false),
        replaced_by_token_id: Set(None),
        device_info: Set(device_info),
        created_at: Set(now),
    };
    row.insert(conn).await?;

    Ok(IssuedTokens {
        access_token: generate_access_token(state, user)?,
        refresh_token: raw,
        refresh_token_id: id,
        family_id,
    })
}

/// Rotate a refresh token. The row is locked while its state is inspected so
/// two concurrent refreshes of the same token serialize: the first rotates,
/// the second observes the consumed row and trips reuse detection.
pub async fn refresh<C>(
    conn: &C,
    state: &AppState,
    raw_token: &str,
    device_info: Option<String>,
) -> anyhow::Result<RefreshOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let now = Utc::now().timestamp();
    let txn = conn.begin().await?;

    let presented = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let presented = match presented {
        Some(row) => row,
        None => {
            txn.commit().await?;
            return Ok(RefreshOutcome::InvalidToken);
        }
    };

    if presented.revoked || presented.replaced_by_token_id.is_some() {
        log::warn!(
            "Refresh token reuse detected for user {}; revoking family {}",
            presented.user_id,
            presented.family_id
        );
        revoke_family(&txn, &presented.family_id).await?;
        txn.commit().await?;
        return Ok(RefreshOutcome::ReuseDetected);
    }

    if now >= presented.expires_at {
        txn.commit().await?;
        return Ok(RefreshOutcome::Expired);
    }

    let user = user::Entity::find_by_id(&presented.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!("Refresh token {} references missing user", presented.id)
        })?;

    let tokens = issue_pair(
        &txn,
        state,
        &user,
        Some(presented.family_id.clone()),
        device_info,
    )
    .await?;

    let mut consumed: refresh_token::ActiveModel = presented.into();
    consumed.revoked = Set(true);
    consumed.replaced_by_token_id = Set(Some(tokens.refresh_token_id.clone()));
    consumed.update(&txn).await?;

    txn.commit().await?;

    Ok(RefreshOutcome::Rotated { tokens, user })
}

/// Revoke every token in a family (logout, or theft response).
pub async fn revoke_family<C: ConnectionTrait>(conn: &C, family_id: &str) -> anyhow::Result<u64> {
    let result = refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::Revoked, Expr::value(true))
        .filter(refresh_token::Column::FamilyId.eq(family_id))
        .filter(refresh_token::Column::Revoked.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Resolve the family a raw refresh token belongs to, if any. Used by logout,
/// which succeeds regardless of token state.
pub async fn find_family_by_raw<C: ConnectionTrait>(
    conn: &C,
    raw_token: &str,
) -> anyhow::Result<Option<String>> {
    let row = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .one(conn)
        .await?;
    Ok(row.map(|r| r.family_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db, test_state};
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[tokio::test]
    async fn test_access_token_claims() {
        let state = test_state(test_db().await);
        let user = seed_user(&state.db, "u-tok-0").await;

        let token = generate_access_token(&state, &user).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[&state.issuer]);
        let decoded = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user.id);
        assert_eq!(decoded.claims.token_type, "access");
        assert_eq!(decoded.claims.role, "USER");
        assert!(!decoded.claims.is_guest);
    }

    #[tokio::test]
    async fn test_refresh_rotates_within_the_family() {
        let state = test_state(test_db().await);
        let user = seed_user(&state.db, "u-tok-1").await;

        let issued = issue_pair(&state.db, &state, &user, None, None).await.unwrap();

        let outcome = refresh(&state.db, &state, &issued.refresh_token, None)
            .await
            .unwrap();
        let rotated = match outcome {
            RefreshOutcome::Rotated { tokens, .. } => tokens,
            other => panic!("unexpected outcome: {other:?}"),
        };

        assert_eq!(rotated.family_id, issued.family_id);
        assert_ne!(rotated.refresh_token, issued.refresh_token);

        let old = refresh_token::Entity::find_by_id(&issued.refresh_token_id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert!(old.revoked);
        assert_eq!(
            old.replaced_by_token_id.as_deref(),
            Some(rotated.refresh_token_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_reuse_of_a_consumed_token_revokes_the_family() {
        let state = test_state(test_db().await);
        let user = seed_user(&state.db, "u-tok-2").await;

        let issued = issue_pair(&state.db, &state, &user, None, None).await.unwrap();

        let rotated = match refresh(&state.db, &state, &issued.refresh_token, None)
            .await
            .unwrap()
        {
            RefreshOutcome::Rotated { tokens, .. } => tokens,
            other => panic!("unexpected outcome: {other:?}"),
        };

        // Replay of the consumed token trips theft detection.
        let outcome = refresh(&state.db, &state, &issued.refresh_token, None)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::ReuseDetected));

        // The successor was revoked along with the family.
        let outcome = refresh(&state.db, &state, &rotated.refresh_token, None)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::ReuseDetected));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let state = test_state(test_db().await);
        seed_user(&state.db, "u-tok-3").await;

        let outcome = refresh(&state.db, &state, "never-issued", None).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::InvalidToken));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_without_family_revocation() {
        let state = test_state(test_db().await);
        let user = seed_user(&state.db, "u-tok-4").await;
        let now = Utc::now().timestamp();

        let raw = generate_opaque_token();
        refresh_token::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            user_id: Set(user.id.clone()),
            token_hash: Set(hash_token(&raw)),
            family_id: Set("fam-expired".to_string()),
            expires_at: Set(now - 10),
            revoked: Set(false),
            replaced_by_token_id: Set(None),
            device_info: Set(None),
            created_at: Set(now - 100),
        }
        .insert(&state.db)
        .await
        .unwrap();

        let outcome = refresh(&state.db, &state, &raw, None).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Expired));

        // Expiry is not theft; the row stays unrevoked.
        let row = refresh_token::Entity::find()
            .filter(refresh_token::Column::FamilyId.eq("fam-expired"))
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert!(!row.revoked);
    }

    #[tokio::test]
    async fn test_logout_revokes_the_whole_family() {
        let state = test_state(test_db().await);
        let user = seed_user(&state.db, "u-tok-5").await;

        let issued = issue_pair(&state.db, &state, &user, None, None).await.unwrap();
        refresh(&state.db, &state, &issued.refresh_token, None)
            .await
            .unwrap();

        let family = find_family_by_raw(&state.db, &issued.refresh_token)
            .await
            .unwrap()
            .expect("consumed token still resolves its family");
        assert_eq!(family, issued.family_id);

        // One row is already revoked by rotation, the live successor remains.
        assert_eq!(revoke_family(&state.db, &family).await.unwrap(), 1);
        assert_eq!(revoke_family(&state.db, &family).await.unwrap(), 0);
    }
}
