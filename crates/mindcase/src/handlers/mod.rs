pub mod auth;
pub mod content;
pub mod oauth;
pub mod payment;
pub mod progress;
pub mod user;

use actix_web::{web, HttpRequest};

use crate::app_state::AppState;
use crate::models::AccessClaims;
use crate::tokens;

/// Authenticated caller, resolved from a verified access token. Handlers
/// branch on `role`/`is_guest` instead of re-parsing the JWT.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub role: String,
    pub is_guest: bool,
}

/// Extract and verify the caller's access token. The Authorization header
/// wins; the httpOnly cookie is the same-origin fallback.
pub fn extract_principal(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
) -> actix_web::Result<Principal> {
    let access_token = bearer_token(req)
        .or_else(|| req.cookie("access_token").map(|c| c.value().to_string()))
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("No access token"))?;

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_issuer(&[&app_state.issuer]);
    validation.set_audience(&[tokens::AUDIENCE]);
    validation.validate_exp = true;

    let token_data = jsonwebtoken::decode::<AccessClaims>(
        &access_token,
        &app_state.decoding_key,
        &validation,
    )
    .map_err(|e| {
        log::warn!("Failed to decode access token: {:?}", e);
        actix_web::error::ErrorUnauthorized("Invalid access token")
    })?;

    if token_data.claims.token_type != "access" {
        return Err(actix_web::error::ErrorUnauthorized("Invalid token type"));
    }

    Ok(Principal {
        id: token_data.claims.sub,
        role: token_data.claims.role,
        is_guest: token_data.claims.is_guest,
    })
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}
