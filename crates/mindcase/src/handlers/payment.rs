use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use entity::entitlement;
use mindcase_core::stripe;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    app_state::AppState,
    entitlements::{self, EntitlementGrant},
    events,
    models::{EntitlementInfo, ErrorResponse, SubscriptionResponse},
};

/// Fallback entitlement window when an event carries no period end.
const DEFAULT_PERIOD_SECS: i64 = 86_400 * 30;

/// POST /api/v1/payment/webhook/stripe
///
/// Signature is verified against the raw body before any parsing. Event
/// deduplication and the entitlement mutation share one transaction. The
/// response is 200 for every processed, duplicate, or irrelevant event so
/// Stripe stops retrying; only signature failures and malformed bodies are
/// rejected.
pub async fn stripe_webhook(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    if let Some(secret) = &app_state.stripe_webhook_secret {
        let header = req
            .headers()
            .get("Stripe-Signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if let Err(e) = stripe::verify_signature(secret, header, &body, Utc::now().timestamp()) {
            log::warn!("Stripe webhook signature rejected: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "invalid_signature".to_string(),
                message: "Webhook signature verification failed".to_string(),
            });
        }
    } else {
        log::warn!("STRIPE_WEBHOOK_SECRET not set; skipping signature verification");
    }

    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Stripe webhook body is not valid JSON: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "invalid_payload".to_string(),
                message: "Malformed webhook payload".to_string(),
            });
        }
    };

    let Some(event_id) = event.get("id").and_then(|v| v.as_str()) else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_payload".to_string(),
            message: "Webhook event has no id".to_string(),
        });
    };
    let event_type = event
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let result = async {
        let txn = app_state.db.begin().await?;

        if !events::claim(&txn, "stripe", event_id).await? {
            txn.commit().await?;
            log::info!("Stripe event {} already processed", event_id);
            return anyhow::Ok(());
        }

        let object = &event["data"]["object"];

        match event_type.as_str() {
            "checkout.session.completed" => {
                handle_checkout_completed(&txn, object).await?;
            }
            "customer.subscription.updated" => {
                handle_subscription_updated(&txn, object).await?;
            }
            "customer.subscription.deleted" => {
                handle_subscription_deleted(&txn, object).await?;
            }
            other => {
                log::info!("Ignoring unhandled Stripe event type: {}", other);
            }
        }

        txn.commit().await?;
        anyhow::Ok(())
    }
    .await;

    match result {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "received": true })),
        Err(e) => {
            // 5xx keeps the event in Stripe's retry queue; the claim above was
            // rolled back with the transaction.
            log::error!("Failed to process Stripe event {}: {}", event_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to process webhook".to_string(),
            })
        }
    }
}

/// GET /api/v1/payment/subscription
/// The caller's own subscription state; the user id comes from the verified
/// access token, never from the request.
pub async fn get_subscription(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let now = Utc::now().timestamp();

    match entitlements::active_for_user(&app_state.db, &principal.id, now).await {
        Ok(rows) => {
            let entitlements: Vec<EntitlementInfo> = rows
                .into_iter()
                .map(|row| EntitlementInfo {
                    provider: row.provider,
                    provider_subscription_id: row.provider_subscription_id,
                    product_id: row.product_id,
                    expires_at: row.expires_at,
                })
                .collect();

            HttpResponse::Ok().json(SubscriptionResponse {
                active: !entitlements.is_empty(),
                entitlements,
            })
        }
        Err(e) => {
            log::error!("Failed to load entitlements for {}: {}", principal.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "An internal error occurred".to_string(),
            })
        }
    }
}

async fn handle_checkout_completed<C: ConnectionTrait>(
    conn: &C,
    object: &serde_json::Value,
) -> anyhow::Result<()> {
    let Some(user_id) = object.get("client_reference_id").and_then(|v| v.as_str()) else {
        log::warn!("checkout.session.completed without client_reference_id; skipping");
        return Ok(());
    };
    let Some(subscription_id) = object.get("subscription").and_then(|v| v.as_str()) else {
        log::warn!("checkout.session.completed without subscription id; skipping");
        return Ok(());
    };

    let expires_at = period_end(object).unwrap_or(Utc::now().timestamp() + DEFAULT_PERIOD_SECS);

    entitlements::grant(
        conn,
        EntitlementGrant {
            user_id: user_id.to_string(),
            provider: "stripe".to_string(),
            provider_subscription_id: subscription_id.to_string(),
            product_id: product_id(object),
            expires_at,
        },
    )
    .await?;

    log::info!(
        "Granted entitlement for user {} (subscription {})",
        user_id,
        subscription_id
    );
    Ok(())
}

async fn handle_subscription_updated<C: ConnectionTrait>(
    conn: &C,
    object: &serde_json::Value,
) -> anyhow::Result<()> {
    let Some(subscription_id) = object.get("id").and_then(|v| v.as_str()) else {
        log::warn!("customer.subscription.updated without id; skipping");
        return Ok(());
    };

    let status = object.get("status").and_then(|v| v.as_str()).unwrap_or("");
    if !matches!(status, "active" | "trialing") {
        entitlements::revoke(conn, "stripe", subscription_id).await?;
        log::info!(
            "Revoked entitlement for subscription {} (status {})",
            subscription_id,
            status
        );
        return Ok(());
    }

    // Renewals may arrive without metadata; in that case the user is resolved
    // from the row the checkout event created.
    let user_id = match object["metadata"]["userId"].as_str() {
        Some(id) => id.to_string(),
        None => {
            let existing = entitlement::Entity::find()
                .filter(entitlement::Column::Provider.eq("stripe"))
                .filter(entitlement::Column::ProviderSubscriptionId.eq(subscription_id))
                .one(conn)
                .await?;
            match existing {
                Some(row) => row.user_id,
                None => {
                    log::warn!(
                        "customer.subscription.updated for unknown subscription {}; skipping",
                        subscription_id
                    );
                    return Ok(());
                }
            }
        }
    };

    let expires_at = period_end(object).unwrap_or(Utc::now().timestamp() + DEFAULT_PERIOD_SECS);

    entitlements::grant(
        conn,
        EntitlementGrant {
            user_id,
            provider: "stripe".to_string(),
            provider_subscription_id: subscription_id.to_string(),
            product_id: product_id(object),
            expires_at,
        },
    )
    .await?;

    log::info!("Renewed entitlement for subscription {}", subscription_id);
    Ok(())
}

async fn handle_subscription_deleted<C: ConnectionTrait>(
    conn: &C,
    object: &serde_json::Value,
) -> anyhow::Result<()> {
    let Some(subscription_id) = object.get("id").and_then(|v| v.as_str()) else {
        log::warn!("customer.subscription.deleted without id; skipping");
        return Ok(());
    };

    entitlements::revoke(conn, "stripe", subscription_id).await?;
    log::info!("Revoked entitlement for subscription {}", subscription_id);
    Ok(())
}

fn period_end(object: &serde_json::Value) -> Option<i64> {
    object.get("current_period_end").and_then(|v| v.as_i64())
}

fn product_id(object: &serde_json::Value) -> Option<String> {
    object["items"]["data"][0]["price"]["product"]
        .as_str()
        .or_else(|| object["metadata"]["productId"].as_str())
        .map(|s| s.to_string())
}
