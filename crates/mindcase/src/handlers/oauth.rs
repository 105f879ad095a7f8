use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use entity::user as user_entity;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    models::{
        ErrorResponse, OAuthCallbackQuery, OAuthStartPayload, OAuthStartResponse,
        OAuthStateClaims,
    },
    tokens,
};

const OAUTH_AUDIENCE: &str = "mindcase-oauth";

/// POST /api/v1/oauth/start
/// Initiate an OAuth flow. The state is a signed short-lived JWT so callbacks
/// work across server instances without shared storage.
pub async fn oauth_start(
    app_state: web::Data<AppState>,
    payload: web::Json<OAuthStartPayload>,
) -> impl Responder {
    log::info!("OAuth start request for provider: {}", payload.provider);

    let now = Utc::now();
    let exp = now + chrono::Duration::minutes(10);

    let claims = OAuthStateClaims {
        iss: app_state.oauth_config.redirect_base.clone(),
        sub: Uuid::new_v4().to_string(),
        aud: OAUTH_AUDIENCE.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
        token_type: "oauth_state".to_string(),
        provider: payload.provider.clone(),
    };

    let state_token = match jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &app_state.encoding_key,
    ) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to encode OAuth state JWT: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to start OAuth flow".to_string(),
            });
        }
    };

    let redirect_uri = format!(
        "{}/api/v1/oauth/callback",
        app_state.oauth_config.redirect_base.trim_end_matches('/')
    );

    let authorization_url = match payload.provider.as_str() {
        "github" => {
            if let (Some(client_id), Some(_)) = (
                &app_state.oauth_config.github_client_id,
                &app_state.oauth_config.github_client_secret,
            ) {
                format!(
                    "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}&scope=read:user user:email&state={}",
                    client_id,
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode(&state_token)
                )
            } else {
                log::error!("GitHub OAuth not configured");
                return HttpResponse::ServiceUnavailable().json(ErrorResponse {
                    error: "oauth_not_configured".to_string(),
                    message: "GitHub OAuth is not configured".to_string(),
                });
            }
        }
        "google" => {
            if let (Some(client_id), Some(_)) = (
                &app_state.oauth_config.google_client_id,
                &app_state.oauth_config.google_client_secret,
            ) {
                format!(
                    "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid email profile&state={}",
                    client_id,
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode(&state_token)
                )
            } else {
                log::error!("Google OAuth not configured");
                return HttpResponse::ServiceUnavailable().json(ErrorResponse {
                    error: "oauth_not_configured".to_string(),
                    message: "Google OAuth is not configured".to_string(),
                });
            }
        }
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "invalid_provider".to_string(),
                message: "Unsupported OAuth provider".to_string(),
            });
        }
    };

    HttpResponse::Ok().json(OAuthStartResponse { authorization_url })
}

/// GET /api/v1/oauth/callback
/// Validate the state, exchange the code, and sign the user in (creating the
/// account on first sight of the provider identity).
pub async fn oauth_callback(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<OAuthCallbackQuery>,
) -> impl Responder {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_issuer(&[&app_state.oauth_config.redirect_base]);
    validation.set_audience(&[OAUTH_AUDIENCE]);
    validation.validate_exp = true;

    let oauth_state = match jsonwebtoken::decode::<OAuthStateClaims>(
        &query.state,
        &app_state.decoding_key,
        &validation,
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            log::error!("Invalid OAuth state token: {:?}", e);
            return HttpResponse::BadRequest().body("Invalid or expired OAuth state");
        }
    };

    if oauth_state.token_type != "oauth_state" {
        log::error!("Invalid OAuth state token_type: {}", oauth_state.token_type);
        return HttpResponse::BadRequest().body("Invalid OAuth state");
    }

    let provider = oauth_state.provider.clone();

    let (provider_user_id, email, display_name) = match provider.as_str() {
        "github" => match exchange_github_code(&app_state, &query.code).await {
            Ok(v) => v,
            Err(e) => {
                log::error!("GitHub OAuth failed: {}", e);
                return HttpResponse::InternalServerError().body("GitHub authentication failed");
            }
        },
        "google" => match exchange_google_code(&app_state, &query.code).await {
            Ok(v) => v,
            Err(e) => {
                log::error!("Google OAuth failed: {}", e);
                return HttpResponse::InternalServerError().body("Google authentication failed");
            }
        },
        _ => {
            return HttpResponse::BadRequest().body("Invalid provider");
        }
    };

    let user = match resolve_or_create_user(
        &app_state,
        &provider,
        &provider_user_id,
        email,
        display_name,
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            log::error!("Failed to resolve OAuth user: {}", e);
            return HttpResponse::InternalServerError().body("Failed to sign in");
        }
    };

    let device_info = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(255).collect());

    let issued = match tokens::issue_pair(&app_state.db, &app_state, &user, None, device_info).await
    {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to create session: {}", e);
            return HttpResponse::InternalServerError().body("Failed to create session");
        }
    };

    log::info!(
        "OAuth authentication successful for user {} (provider={})",
        user.id,
        provider
    );

    HttpResponse::Found()
        .append_header(("Location", "/oauth-complete"))
        .cookie(
            actix_web::cookie::Cookie::build("access_token", issued.access_token)
                .path("/")
                .http_only(true)
                .same_site(actix_web::cookie::SameSite::Lax)
                .max_age(actix_web::cookie::time::Duration::seconds(
                    app_state.access_token_expiration,
                ))
                .finish(),
        )
        .cookie(
            actix_web::cookie::Cookie::build("refresh_token", issued.refresh_token)
                .path("/")
                .http_only(true)
                .same_site(actix_web::cookie::SameSite::Lax)
                .max_age(actix_web::cookie::time::Duration::seconds(
                    app_state.refresh_token_expiration,
                ))
                .finish(),
        )
        .finish()
}

/// Find the user owning this provider identity, or create a fresh one. Racing
/// first sign-ins resolve through the unique provider-id column.
async fn resolve_or_create_user(
    app_state: &AppState,
    provider: &str,
    provider_user_id: &str,
    email: Option<String>,
    display_name: Option<String>,
) -> anyhow::Result<user_entity::Model> {
    let provider_column = match provider {
        "google" => user_entity::Column::GoogleId,
        "github" => user_entity::Column::GithubId,
        other => anyhow::bail!("Unsupported OAuth provider: {other}"),
    };

    if let Some(user) = user_entity::Entity::find()
        .filter(provider_column.eq(provider_user_id))
        .one(&app_state.db)
        .await?
    {
        return Ok(user);
    }

    let now = Utc::now().timestamp();
    let new_user = user_entity::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        email: Set(None),
        password_hash: Set(None),
        name: Set(display_name.or_else(|| {
            email.as_deref().and_then(|e| e.split('@').next()).map(|s| s.to_string())
        })),
        role: Set(user_entity::ROLE_USER.to_string()),
        google_id: Set((provider == "google").then(|| provider_user_id.to_string())),
        github_id: Set((provider == "github").then(|| provider_user_id.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match new_user.insert(&app_state.db).await {
        Ok(user) => Ok(user),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("unique") || msg.contains("duplicate") {
                // A concurrent first sign-in created the user; load theirs.
                user_entity::Entity::find()
                    .filter(provider_column.eq(provider_user_id))
                    .one(&app_state.db)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("OAuth user insert raced but cannot be reloaded"))
            } else {
                Err(e.into())
            }
        }
    }
}

/// Exchange a GitHub code for `(provider_user_id, email, display_name)`.
async fn exchange_github_code(
    app_state: &AppState,
    code: &str,
) -> anyhow::Result<(String, Option<String>, Option<String>)> {
    let client = reqwest::Client::new();

    let redirect_uri = format!(
        "{}/api/v1/oauth/callback",
        app_state.oauth_config.redirect_base.trim_end_matches('/')
    );

    let client_id = app_state
        .oauth_config
        .github_client_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GitHub OAuth not configured"))?;
    let client_secret = app_state
        .oauth_config
        .github_client_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GitHub OAuth not configured"))?;

    let token_resp = client
        .post("https://github.com/login/oauth/access_token")
        .header("Accept", "application/json")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", &redirect_uri),
        ])
        .send()
        .await?;

    let status = token_resp.status();
    let body = token_resp.text().await?;

    if !status.is_success() {
        anyhow::bail!("GitHub token exchange failed ({status})");
    }

    let access_token = mindcase_core::oauth::parse_access_token_from_token_exchange_body(&body)
        .map_err(|e| {
            anyhow::anyhow!(
                "GitHub token exchange failed: {e} (check GITHUB_CLIENT_ID/GITHUB_CLIENT_SECRET and callback URL: {redirect_uri})"
            )
        })?;

    let user_response = client
        .get("https://api.github.com/user")
        .header("Authorization", format!("Bearer {}", access_token))
        .header("User-Agent", "MindCase")
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;

    let user_id = user_response["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("No user ID in GitHub response"))?
        .to_string();

    let email = user_response["email"].as_str().map(|s| s.to_string());
    let name = user_response["login"].as_str().map(|s| s.to_string());

    Ok((user_id, email, name))
}

/// Exchange a Google code for `(provider_user_id, email, display_name)`.
async fn exchange_google_code(
    app_state: &AppState,
    code: &str,
) -> anyhow::Result<(String, Option<String>, Option<String>)> {
    let client = reqwest::Client::new();

    let redirect_uri = format!(
        "{}/api/v1/oauth/callback",
        app_state.oauth_config.redirect_base.trim_end_matches('/')
    );

    let client_id = app_state
        .oauth_config
        .google_client_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Google OAuth not configured"))?;
    let client_secret = app_state
        .oauth_config
        .google_client_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Google OAuth not configured"))?;

    let token_resp = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &redirect_uri),
        ])
        .send()
        .await?;

    let status = token_resp.status();
    let body = token_resp.text().await?;

    if !status.is_success() {
        anyhow::bail!("Google token exchange failed ({status})");
    }

    let access_token = mindcase_core::oauth::parse_access_token_from_token_exchange_body(&body)
        .map_err(|e| anyhow::anyhow!("Google token exchange failed: {e}"))?;

    let user_response = client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;

    let user_id = user_response["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("No user ID in Google response"))?
        .to_string();

    let email = user_response["email"].as_str().map(|s| s.to_string());
    let name = user_response["name"].as_str().map(|s| s.to_string());

    Ok((user_id, email, name))
}
