use actix_web::{web, HttpRequest, HttpResponse, Responder};
use entity::user as user_entity;
use sea_orm::EntityTrait;

use crate::{app_state::AppState, models::ErrorResponse, models::UserInfo};

/// GET /api/v1/user/me
pub async fn get_user_info(app_state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let principal = match super::extract_principal(&req, &app_state) {
        Ok(p) => p,
        Err(e) => return e.error_response(),
    };

    match user_entity::Entity::find_by_id(&principal.id)
        .one(&app_state.db)
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(UserInfo::from(&user)),
        Ok(None) => {
            // A valid token for a deleted account.
            log::warn!("Access token references missing user {}", principal.id);
            HttpResponse::Unauthorized().json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "Account no longer exists".to_string(),
            })
        }
        Err(e) => {
            log::error!("Database error (user lookup): {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Database error occurred".to_string(),
            })
        }
    }
}
