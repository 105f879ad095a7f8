use chrono::Utc;
use entity::{entitlement, user};
use jsonwebtoken::{DecodingKey, EncodingKey};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use uuid::Uuid;

use crate::app_state::{AppState, OAuthConfig};

/// Fresh in-memory SQLite database with the full schema applied. A pool of
/// one, since every pooled connection would otherwise get its own memory db.
pub async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub fn test_state(db: DatabaseConnection) -> AppState {
    AppState {
        db,
        encoding_key: EncodingKey::from_secret(b"test-secret"),
        decoding_key: DecodingKey::from_secret(b"test-secret"),
        issuer: "http://localhost:8080".to_string(),
        access_token_expiration: 900,
        refresh_token_expiration: 2_592_000,
        oauth_config: OAuthConfig {
            google_client_id: None,
            google_client_secret: None,
            github_client_id: None,
            github_client_secret: None,
            redirect_base: "http://localhost:8080".to_string(),
        },
        stripe_webhook_secret: None,
    }
}

pub async fn seed_user(db: &DatabaseConnection, id: &str) -> user::Model {
    let now = Utc::now().timestamp();
    user::ActiveModel {
        id: Set(id.to_string()),
        email: Set(Some(format!("{id}@example.com"))),
        password_hash: Set(None),
        name: Set(Some(id.to_string())),
        role: Set(user::ROLE_USER.to_string()),
        google_id: Set(None),
        github_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert test user")
}

/// Active premium entitlement expiring far in the future.
pub async fn seed_premium(db: &DatabaseConnection, user_id: &str) -> entitlement::Model {
    let now = Utc::now().timestamp();
    entitlement::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        user_id: Set(user_id.to_string()),
        provider: Set("stripe".to_string()),
        provider_subscription_id: Set(format!("sub_test_{user_id}")),
        product_id: Set(Some("premium_monthly".to_string())),
        status: Set(entitlement::STATUS_ACTIVE.to_string()),
        expires_at: Set(now + 86_400 * 30),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert test entitlement")
}
