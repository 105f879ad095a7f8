use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::{
    app_state::AppState,
    models::{AccessQuery, AccessResponse, ErrorResponse, UnlockPayload, UnlockResponse},
    unlocks::{self, UnlockOutcome},
};

/// POST /api/v1/content/unlock
/// Spend tokens to permanently unlock a piece of content. Prices are fixed
/// server-side; the request carries no amount.
pub async fn unlock(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<UnlockPayload>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    let content_id = payload.content_id.trim();
    if content_id.is_empty() || content_id.len() > 128 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_content_id".to_string(),
            message: "A content id is required".to_string(),
        });
    }

    let outcome = match unlocks::unlock(
        &app_state.db,
        &principal.id,
        &payload.content_type,
        content_id,
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("Unlock failed for {}: {}", principal.id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "An internal error occurred".to_string(),
            });
        }
    };

    match outcome {
        UnlockOutcome::Unlocked {
            balance,
            tokens_spent,
        } => HttpResponse::Ok().json(UnlockResponse {
            success: true,
            reason: None,
            balance,
            tokens_spent,
        }),
        // No charge happened, so the unlock request itself failed.
        UnlockOutcome::AlreadyUnlocked { balance } => HttpResponse::Ok().json(UnlockResponse {
            success: false,
            reason: Some("already_unlocked".to_string()),
            balance,
            tokens_spent: 0,
        }),
        UnlockOutcome::InsufficientBalance { balance } => HttpResponse::Ok().json(UnlockResponse {
            success: false,
            reason: Some("insufficient_balance".to_string()),
            balance,
            tokens_spent: 0,
        }),
        UnlockOutcome::UnknownContentType => HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_content_type".to_string(),
            message: "Unrecognized content type".to_string(),
        }),
    }
}

/// GET /api/v1/content/unlocked
pub async fn list_unlocked(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    match unlocks::list(&app_state.db, &principal.id).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            log::error!("Failed to list unlocks for {}: {}", principal.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "An internal error occurred".to_string(),
            })
        }
    }
}

/// GET /api/v1/content/access
/// Single access decision: active premium grants everything, otherwise the
/// content must have been unlocked.
pub async fn check_access(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AccessQuery>,
) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    match unlocks::has_access(
        &app_state.db,
        &principal.id,
        &query.content_type,
        &query.content_id,
    )
    .await
    {
        Ok(has_access) => HttpResponse::Ok().json(AccessResponse { has_access }),
        Err(e) => {
            log::error!("Access check failed for {}: {}", principal.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "An internal error occurred".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db, test_state};
    use crate::wallet::{self, EarnSource};
    use crate::tokens;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_repeat_unlock_fails_without_charging() {
        let db = test_db().await;
        let user = seed_user(&db, "u-cont-1").await;
        wallet::earn(&db, &user.id, 25, EarnSource::Bonus, None)
            .await
            .unwrap();
        let state = test_state(db);
        let access = tokens::generate_access_token(&state, &user).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/content/unlock", web::post().to(unlock)),
        )
        .await;

        let request = || {
            test::TestRequest::post()
                .uri("/content/unlock")
                .insert_header(("Authorization", format!("Bearer {access}")))
                .set_json(serde_json::json!({
                    "contentType": "hint",
                    "contentId": "case-7",
                }))
                .to_request()
        };

        let first: serde_json::Value = test::call_and_read_body_json(&app, request()).await;
        assert_eq!(first["success"], serde_json::json!(true));
        assert_eq!(first["balance"], serde_json::json!(15));

        let second: serde_json::Value = test::call_and_read_body_json(&app, request()).await;
        assert_eq!(second["success"], serde_json::json!(false));
        assert_eq!(second["reason"], serde_json::json!("already_unlocked"));
        assert_eq!(second["balance"], serde_json::json!(15));
        assert_eq!(second["tokensSpent"], serde_json::json!(0));
    }
}
