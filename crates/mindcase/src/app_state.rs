use jsonwebtoken::{DecodingKey, EncodingKey};
use sea_orm::DatabaseConnection;

/// Shared application state
pub struct AppState {
    /// Sea-ORM database connection pool
    pub db: DatabaseConnection,

    /// HS256 key for signing access tokens
    pub encoding_key: EncodingKey,

    /// HS256 key for verifying access tokens
    pub decoding_key: DecodingKey,

    /// JWT issuer claim (the server's base URL)
    pub issuer: String,

    /// Access token expiration time in seconds
    pub access_token_expiration: i64,

    /// Refresh token expiration time in seconds
    pub refresh_token_expiration: i64,

    /// OAuth configuration
    pub oauth_config: OAuthConfig,

    /// Stripe webhook signing secret; signature checks are skipped when unset.
    pub stripe_webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub redirect_base: String,
}
