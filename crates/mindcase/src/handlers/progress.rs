use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use mindcase_core::limits;
use sea_orm::TransactionTrait;

use crate::{
    app_state::AppState,
    events,
    models::{
        AdCompletePayload, AdCompleteResponse, ErrorResponse, MinigameCompletePayload,
        MinigameCompleteResponse, MinigameStartPayload, MinigameStartResponse, SpendPayload,
        SpendResponse, TransactionInfo, TransactionsQuery, WalletResponse,
    },
    sessions::{self, CompleteOutcome},
    wallet::{self, EarnOutcome, EarnSource, SpendOutcome},
};

/// GET /api/v1/progress/wallet
pub async fn get_wallet(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let view = match wallet::get_or_create(&app_state.db, &principal.id).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to load wallet for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    let premium = match crate::entitlements::has_active_premium(
        &app_state.db,
        &principal.id,
        Utc::now().timestamp(),
    )
    .await
    {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to check entitlements for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    HttpResponse::Ok().json(WalletResponse {
        balance: view.balance,
        total_earned: view.total_earned,
        total_spent: view.total_spent,
        tokens_earned_today: view.tokens_earned_today,
        daily_limit: limits::daily_limit(premium),
        remaining_today: limits::remaining_today(premium, view.tokens_earned_today),
    })
}

/// GET /api/v1/progress/wallet/transactions
pub async fn get_transactions(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TransactionsQuery>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let limit = query.limit.unwrap_or(50);

    let rows = match wallet::transactions(&app_state.db, &principal.id, limit).await {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("Failed to list transactions for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    let items: Vec<TransactionInfo> = rows
        .into_iter()
        .map(|row| TransactionInfo {
            id: row.id,
            tx_type: row.tx_type,
            amount: row.amount,
            balance_after: row.balance_after,
            metadata: row
                .metadata
                .as_deref()
                .and_then(|m| serde_json::from_str(m).ok()),
            created_at: row.created_at,
        })
        .collect();

    HttpResponse::Ok().json(items)
}

/// POST /api/v1/progress/wallet/spend
/// Generic token spend. Business failures come back as `success: false`
/// rather than HTTP errors so the game client handles one response shape.
pub async fn spend(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<SpendPayload>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    if payload.amount <= 0 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_amount".to_string(),
            message: "Amount must be positive".to_string(),
        });
    }

    let Some(tx_type) = wallet::spend_tx_type(&payload.purpose) else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_purpose".to_string(),
            message: "Unrecognized spend purpose".to_string(),
        });
    };

    let outcome = match wallet::spend(
        &app_state.db,
        &principal.id,
        payload.amount,
        &tx_type,
        payload.metadata.clone(),
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("Spend failed for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    match outcome {
        SpendOutcome::Spent { wallet } => HttpResponse::Ok().json(SpendResponse {
            success: true,
            reason: None,
            balance: wallet.balance,
        }),
        SpendOutcome::InsufficientBalance { balance } => HttpResponse::Ok().json(SpendResponse {
            success: false,
            reason: Some("insufficient_balance".to_string()),
            balance,
        }),
    }
}

/// POST /api/v1/progress/minigame/start
pub async fn minigame_start(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<MinigameStartPayload>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    if payload.game_type.trim().is_empty() || payload.game_type.len() > 64 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_game_type".to_string(),
            message: "A game type is required".to_string(),
        });
    }

    let session = match sessions::start(&app_state.db, &principal.id, payload.game_type.trim()).await
    {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to start session for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    HttpResponse::Ok().json(MinigameStartResponse {
        session_id: session.id,
        expires_at: session.expires_at,
        max_duration_ms: sessions::MAX_DURATION_SECS * 1000,
    })
}

/// POST /api/v1/progress/minigame/complete
/// Settle the session, then credit the reward (subject to the daily limit)
/// when the run succeeded.
pub async fn minigame_complete(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<MinigameCompletePayload>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let outcome = match sessions::complete(
        &app_state.db,
        &principal.id,
        &payload.session_id,
        &payload.result,
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("Failed to complete session for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    let can_claim = match outcome {
        CompleteOutcome::Completed { can_claim_reward } => can_claim_reward,
        CompleteOutcome::InvalidSession => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "invalid_session".to_string(),
                message: "Unknown session".to_string(),
            });
        }
        CompleteOutcome::AlreadyUsed => {
            return reward_rejected("session_already_used");
        }
        CompleteOutcome::Expired => {
            return reward_rejected("session_expired");
        }
        CompleteOutcome::TooFast => {
            return reward_rejected("too_fast");
        }
    };

    if !can_claim {
        return HttpResponse::Ok().json(MinigameCompleteResponse {
            success: true,
            reason: None,
            can_claim_reward: false,
            reward_tokens: 0,
        });
    }

    let earned = match wallet::earn(
        &app_state.db,
        &principal.id,
        limits::MINIGAME_REWARD_TOKENS,
        EarnSource::Minigame,
        Some(serde_json::json!({ "sessionId": payload.session_id })),
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("Failed to credit minigame reward for {}: {}", principal.id, e);
            return internal_error();
        }
    };

    match earned {
        EarnOutcome::Credited { credited, .. } => {
            HttpResponse::Ok().json(MinigameCompleteResponse {
                success: true,
                reason: None,
                can_claim_reward: true,
                reward_tokens: credited,
            })
        }
        EarnOutcome::DailyLimitReached { .. } => {
            HttpResponse::Ok().json(MinigameCompleteResponse {
                success: true,
                reason: Some("daily_limit_reached".to_string()),
                can_claim_reward: true,
                reward_tokens: 0,
            })
        }
    }
}

/// POST /api/v1/progress/ad/complete
/// Rewarded-ad callback. The idempotency claim and the credit share one
/// transaction, so a crash between them cannot strand a claimed event.
pub async fn ad_complete(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<AdCompletePayload>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let transaction_id = payload.transaction_id.trim();
    if transaction_id.is_empty() || transaction_id.len() > 128 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_transaction_id".to_string(),
            message: "A transaction id is required".to_string(),
        });
    }

    let result = async {
        let txn = app_state.db.begin().await?;

        if !events::claim(&txn, "ad", transaction_id).await? {
            txn.commit().await?;
            return anyhow::Ok(None);
        }

        let outcome = wallet::earn(
            &txn,
            &principal.id,
            limits::AD_REWARD_TOKENS,
            EarnSource::Ad,
            Some(serde_json::json!({ "transactionId": transaction_id })),
        )
        .await?;

        txn.commit().await?;
        anyhow::Ok(Some(outcome))
    }
    .await;

    match result {
        Ok(Some(EarnOutcome::Credited { credited, wallet })) => {
            HttpResponse::Ok().json(AdCompleteResponse {
                success: true,
                duplicate: false,
                reward_tokens: credited,
                balance: wallet.balance,
            })
        }
        // Ad credits are not daily-limited, so this arm is unreachable today;
        // report it as a zero credit if the policy ever changes.
        Ok(Some(EarnOutcome::DailyLimitReached { .. })) => {
            HttpResponse::Ok().json(AdCompleteResponse {
                success: true,
                duplicate: false,
                reward_tokens: 0,
                balance: 0,
            })
        }
        Ok(None) => {
            let balance = match wallet::get_or_create(&app_state.db, &principal.id).await {
                Ok(v) => v.balance,
                Err(e) => {
                    log::error!("Failed to load wallet for {}: {}", principal.id, e);
                    return internal_error();
                }
            };
            HttpResponse::Ok().json(AdCompleteResponse {
                success: true,
                duplicate: true,
                reward_tokens: 0,
                balance,
            })
        }
        Err(e) => {
            log::error!("Ad completion failed for {}: {}", principal.id, e);
            internal_error()
        }
    }
}

fn reward_rejected(reason: &str) -> HttpResponse {
    HttpResponse::Ok().json(MinigameCompleteResponse {
        success: false,
        reason: Some(reason.to_string()),
        can_claim_reward: false,
        reward_tokens: 0,
    })
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: "internal_error".to_string(),
        message: "An internal error occurred".to_string(),
    })
}
