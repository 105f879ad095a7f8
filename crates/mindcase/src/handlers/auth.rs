use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use entity::{login_history, user as user_entity};
use mindcase_core::password;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    models::{
        AuthResponse, ErrorResponse, LoginPayload, RefreshPayload, RegisterPayload, UserInfo,
    },
    tokens::{self, IssuedTokens, RefreshOutcome},
};

/// POST /api/v1/auth/register
/// Register an email/password account. When the caller presents a valid guest
/// access token, the guest account is upgraded in place so its wallet and
/// unlocks carry over.
pub async fn register(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<RegisterPayload>,
) -> impl Responder {
    let email = payload.email.trim().to_lowercase();

    if !email.contains('@') || email.len() > 254 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_email".to_string(),
            message: "A valid email address is required".to_string(),
        });
    }

    if payload.password.len() < 8 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_password".to_string(),
            message: "Password must be at least 8 characters".to_string(),
        });
    }

    // Duplicate email check. The unique column is the real guard; this only
    // produces a friendlier error for the common case.
    match user_entity::Entity::find()
        .filter(user_entity::Column::Email.eq(&email))
        .one(&app_state.db)
        .await
    {
        Ok(Some(_)) => {
            log::warn!("Registration failed: email already registered");
            return HttpResponse::Conflict().json(ErrorResponse {
                error: "email_taken".to_string(),
                message: "Email is already registered".to_string(),
            });
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("Database error during registration check: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Database error occurred".to_string(),
            });
        }
    }

    let password_hash = match password::hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("Failed to hash password: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to process password".to_string(),
            });
        }
    };

    let now = Utc::now().timestamp();

    // Guest upgrade: a valid guest access token turns this into an in-place
    // account upgrade instead of a fresh user.
    let guest_id = super::extract_principal(&req, &app_state)
        .ok()
        .filter(|p| p.is_guest)
        .map(|p| p.id);

    let user = if let Some(guest_id) = guest_id {
        let guest = match user_entity::Entity::find_by_id(&guest_id).one(&app_state.db).await {
            Ok(Some(u)) if u.is_guest() => u,
            Ok(_) => {
                log::warn!("Guest token references non-guest or missing user {}", guest_id);
                return HttpResponse::Unauthorized().json(ErrorResponse {
                    error: "unauthorized".to_string(),
                    message: "Invalid guest session".to_string(),
                });
            }
            Err(e) => {
                log::error!("Database error (guest lookup): {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Database error occurred".to_string(),
                });
            }
        };

        let mut upgraded: user_entity::ActiveModel = guest.into();
        upgraded.email = Set(Some(email.clone()));
        upgraded.password_hash = Set(Some(password_hash));
        upgraded.name = Set(payload.name.clone());
        upgraded.role = Set(user_entity::ROLE_USER.to_string());
        upgraded.updated_at = Set(now);

        match upgraded.update(&app_state.db).await {
            Ok(u) => {
                log::info!("Guest {} upgraded to a registered account", u.id);
                u
            }
            // The email can be claimed between the duplicate check above and
            // this update; the unique column reports it here instead.
            Err(e) if is_unique_violation(&e) => {
                return HttpResponse::Conflict().json(ErrorResponse {
                    error: "email_taken".to_string(),
                    message: "Email is already registered".to_string(),
                });
            }
            Err(e) => {
                log::error!("Failed to upgrade guest account: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to create account".to_string(),
                });
            }
        }
    } else {
        let new_user = user_entity::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            email: Set(Some(email.clone())),
            password_hash: Set(Some(password_hash)),
            name: Set(payload.name.clone()),
            role: Set(user_entity::ROLE_USER.to_string()),
            google_id: Set(None),
            github_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match new_user.insert(&app_state.db).await {
            Ok(u) => u,
            Err(e) if is_unique_violation(&e) => {
                return HttpResponse::Conflict().json(ErrorResponse {
                    error: "email_taken".to_string(),
                    message: "Email is already registered".to_string(),
                });
            }
            Err(e) => {
                log::error!("Failed to insert user: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to create account".to_string(),
                });
            }
        }
    };

    log::info!("User registered successfully (ID: {})", user.id);

    issue_session(&app_state, &req, &user).await
}

/// POST /api/v1/auth/login
pub async fn login(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<LoginPayload>,
) -> impl Responder {
    let email = payload.email.trim().to_lowercase();

    let user = match user_entity::Entity::find()
        .filter(user_entity::Column::Email.eq(&email))
        .one(&app_state.db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            log::warn!("Login failed: unknown email");
            return invalid_credentials();
        }
        Err(e) => {
            log::error!("Database error (user lookup): {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Database error occurred".to_string(),
            });
        }
    };

    // Social-only accounts have no password; same response as a bad password
    // so login probes learn nothing.
    let Some(password_hash) = user.password_hash.as_deref() else {
        log::warn!("Login failed: account {} has no password credential", user.id);
        return invalid_credentials();
    };

    let password_valid = match password::verify_password(&payload.password, password_hash) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to verify password hash for user {}: {e}", user.id);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to verify password".to_string(),
            });
        }
    };

    if !password_valid {
        log::warn!("Login failed: invalid password for user {}", user.id);
        return invalid_credentials();
    }

    record_login(&app_state, &req, &user.id).await;

    log::info!("Login successful for user {}", user.id);

    issue_session(&app_state, &req, &user).await
}

/// POST /api/v1/auth/guest
/// Create an anonymous account so play can start before any signup.
pub async fn guest(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let now = Utc::now().timestamp();

    let new_user = user_entity::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        email: Set(None),
        password_hash: Set(None),
        name: Set(None),
        role: Set(user_entity::ROLE_GUEST.to_string()),
        google_id: Set(None),
        github_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let user = match new_user.insert(&app_state.db).await {
        Ok(u) => u,
        Err(e) => {
            log::error!("Failed to create guest user: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to create guest account".to_string(),
            });
        }
    };

    log::info!("Guest account created (ID: {})", user.id);

    issue_session(&app_state, &req, &user).await
}

/// POST /api/v1/auth/refresh
/// Rotate the refresh token and mint a new access token.
pub async fn refresh(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: Option<web::Json<RefreshPayload>>,
) -> impl Responder {
    let Some(raw_token) = presented_refresh_token(&req, payload) else {
        return HttpResponse::Unauthorized().json(ErrorResponse {
            error: "missing_token".to_string(),
            message: "No refresh token provided".to_string(),
        });
    };

    let device_info = user_agent(&req);

    let outcome = match tokens::refresh(&app_state.db, &app_state, &raw_token, device_info).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Refresh failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to refresh session".to_string(),
            });
        }
    };

    match outcome {
        RefreshOutcome::Rotated { tokens, user } => auth_ok(&app_state, &user, tokens),
        RefreshOutcome::InvalidToken => HttpResponse::Unauthorized().json(ErrorResponse {
            error: "invalid_refresh_token".to_string(),
            message: "Invalid refresh token".to_string(),
        }),
        RefreshOutcome::Expired => HttpResponse::Unauthorized().json(ErrorResponse {
            error: "refresh_token_expired".to_string(),
            message: "Refresh token has expired".to_string(),
        }),
        RefreshOutcome::ReuseDetected => HttpResponse::Forbidden().json(ErrorResponse {
            error: "token_reuse_detected".to_string(),
            message: "Session revoked; please sign in again".to_string(),
        }),
    }
}

/// POST /api/v1/auth/logout
/// Revoke the whole token family and clear cookies. Always succeeds: an
/// unknown or already-revoked token leaves nothing to revoke.
pub async fn logout(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: Option<web::Json<RefreshPayload>>,
) -> impl Responder {
    if let Some(raw_token) = presented_refresh_token(&req, payload) {
        match tokens::find_family_by_raw(&app_state.db, &raw_token).await {
            Ok(Some(family_id)) => {
                if let Err(e) = tokens::revoke_family(&app_state.db, &family_id).await {
                    log::error!("Failed to revoke token family {}: {}", family_id, e);
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("Database error during logout: {}", e),
        }
    }

    HttpResponse::Ok()
        .cookie(clear_cookie("access_token"))
        .cookie(clear_cookie("refresh_token"))
        .json(serde_json::json!({ "success": true }))
}

/// Issue a fresh token pair (new family) and respond with cookies + body.
async fn issue_session(
    app_state: &web::Data<AppState>,
    req: &HttpRequest,
    user: &user_entity::Model,
) -> HttpResponse {
    let device_info = user_agent(req);

    match tokens::issue_pair(&app_state.db, app_state, user, None, device_info).await {
        Ok(tokens) => auth_ok(app_state, user, tokens),
        Err(e) => {
            log::error!("Failed to create session: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to create session".to_string(),
            })
        }
    }
}

/// Tokens land in httpOnly cookies for same-origin clients and in the body
/// for the cross-origin game client.
fn auth_ok(app_state: &AppState, user: &user_entity::Model, tokens: IssuedTokens) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(
            actix_web::cookie::Cookie::build("access_token", tokens.access_token.clone())
                .path("/")
                .http_only(true)
                .same_site(actix_web::cookie::SameSite::Lax)
                .max_age(actix_web::cookie::time::Duration::seconds(
                    app_state.access_token_expiration,
                ))
                .finish(),
        )
        .cookie(
            actix_web::cookie::Cookie::build("refresh_token", tokens.refresh_token.clone())
                .path("/")
                .http_only(true)
                .same_site(actix_web::cookie::SameSite::Lax)
                .max_age(actix_web::cookie::time::Duration::seconds(
                    app_state.refresh_token_expiration,
                ))
                .finish(),
        )
        .json(AuthResponse {
            user: UserInfo::from(user),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
}

fn clear_cookie(name: &str) -> actix_web::cookie::Cookie<'_> {
    actix_web::cookie::Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .same_site(actix_web::cookie::SameSite::Lax)
        .max_age(actix_web::cookie::time::Duration::ZERO)
        .finish()
}

/// Both SQLite and Postgres mention the violated constraint kind in the
/// error text; sea-orm does not expose a typed code across backends.
fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("unique") || msg.contains("duplicate")
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorResponse {
        error: "invalid_credentials".to_string(),
        message: "Invalid email or password".to_string(),
    })
}

fn presented_refresh_token(
    req: &HttpRequest,
    payload: Option<web::Json<RefreshPayload>>,
) -> Option<String> {
    payload
        .and_then(|p| p.refresh_token.clone())
        .or_else(|| req.cookie("refresh_token").map(|c| c.value().to_string()))
}

fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(255).collect())
}

/// Best-effort audit trail; a failed insert never fails the login.
async fn record_login(app_state: &AppState, req: &HttpRequest, user_id: &str) {
    let row = login_history::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(user_id.to_string()),
        ip: Set(req.peer_addr().map(|a| a.ip().to_string())),
        user_agent: Set(user_agent(req)),
        created_at: Set(Utc::now().timestamp()),
    };

    if let Err(e) = row.insert(&app_state.db).await {
        log::warn!("Failed to record login history for {}: {}", user_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db};

    fn guest_row(now: i64) -> user_entity::ActiveModel {
        user_entity::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            email: Set(None),
            password_hash: Set(None),
            name: Set(None),
            role: Set(user_entity::ROLE_GUEST.to_string()),
            google_id: Set(None),
            github_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    /// An email claimed between the duplicate pre-check and the write surfaces
    /// as a constraint error on both the insert and the guest-upgrade update;
    /// both must classify as a conflict, not an internal error.
    #[tokio::test]
    async fn test_taken_email_classifies_as_unique_violation() {
        let db = test_db().await;
        let taken = seed_user(&db, "u-auth-1").await;
        let now = Utc::now().timestamp();

        let guest = guest_row(now).insert(&db).await.unwrap();
        let mut upgraded: user_entity::ActiveModel = guest.into();
        upgraded.email = Set(taken.email.clone());
        upgraded.role = Set(user_entity::ROLE_USER.to_string());
        upgraded.updated_at = Set(now);
        let err = upgraded.update(&db).await.unwrap_err();
        assert!(is_unique_violation(&err));

        let mut duplicate = guest_row(now);
        duplicate.email = Set(taken.email.clone());
        let err = duplicate.insert(&db).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
