use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "mindcase")]
#[command(about = "MindCase Game Backend Server", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the backend server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./mindcase.db?mode=rwc"
        )]
        database_url: String,
    },

    /// Create a new user
    CreateUser {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List all users
    ListUsers,
}

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./mindcase.db?mode=rwc"
    )]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Allowed CORS origins (comma-separated)
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000,http://localhost:5173"
    )]
    pub cors_origins: String,

    /// HS256 signing secret for access tokens. Required: the server refuses
    /// to start without it.
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token expiration time in seconds
    #[arg(long, env = "ACCESS_TOKEN_EXPIRATION", default_value = "900")]
    pub access_token_expiration: i64,

    /// Refresh token expiration time in seconds
    #[arg(long, env = "REFRESH_TOKEN_EXPIRATION", default_value = "2592000")]
    pub refresh_token_expiration: i64,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Base URL for the server (JWT issuer claim, OAuth redirects)
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Google OAuth Client ID
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth Client Secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    /// GitHub OAuth Client ID
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    /// GitHub OAuth Client Secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET")]
    pub github_client_secret: Option<String>,

    /// Stripe webhook signing secret. When unset, webhook signatures are not
    /// verified (local development only).
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET")]
    pub stripe_webhook_secret: Option<String>,
}

impl ServeConfig {
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServeConfig {
        ServeConfig {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:8080".to_string(),
            cors_origins: "http://localhost:3000, http://example.com".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_expiration: 900,
            refresh_token_expiration: 2_592_000,
            log_level: "info".to_string(),
            base_url: "http://localhost:8080".to_string(),
            google_client_id: None,
            google_client_secret: None,
            github_client_id: None,
            github_client_secret: None,
            stripe_webhook_secret: None,
        }
    }

    #[test]
    fn test_cors_origin_parsing() {
        let origins = test_config().cors_origin_list();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://localhost:3000");
        assert_eq!(origins[1], "http://example.com");
    }
}
