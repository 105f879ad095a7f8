use crate::{
    app_state::{AppState, OAuthConfig},
    config::ServeConfig,
    handlers,
};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use jsonwebtoken::{DecodingKey, EncodingKey};
use migration::MigratorTrait;
use sea_orm::Database;

pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    log::info!("Starting MindCase API Server...");

    // Refuse to start with a signing secret that cannot protect anything.
    if config.jwt_secret.trim().len() < 16 {
        anyhow::bail!("JWT_SECRET must be set to at least 16 characters");
    }

    log::info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    log::info!("Database migrations completed");

    let oauth_config = OAuthConfig {
        google_client_id: config.google_client_id.clone(),
        google_client_secret: config.google_client_secret.clone(),
        github_client_id: config.github_client_id.clone(),
        github_client_secret: config.github_client_secret.clone(),
        redirect_base: config.base_url.clone(),
    };

    let app_state = web::Data::new(AppState {
        db,
        encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        issuer: config.base_url.clone(),
        access_token_expiration: config.access_token_expiration,
        refresh_token_expiration: config.refresh_token_expiration,
        oauth_config,
        stripe_webhook_secret: config.stripe_webhook_secret.clone(),
    });

    let bind_address = config.bind_address.clone();
    let cors_origins = config.cors_origin_list();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        let api_routes = web::scope("/api/v1")
            .route("/auth/register", web::post().to(handlers::auth::register))
            .route("/auth/login", web::post().to(handlers::auth::login))
            .route("/auth/guest", web::post().to(handlers::auth::guest))
            .route("/auth/refresh", web::post().to(handlers::auth::refresh))
            .route("/auth/logout", web::post().to(handlers::auth::logout))
            .route("/oauth/start", web::post().to(handlers::oauth::oauth_start))
            .route(
                "/oauth/callback",
                web::get().to(handlers::oauth::oauth_callback),
            )
            .route(
                "/progress/wallet",
                web::get().to(handlers::progress::get_wallet),
            )
            .route(
                "/progress/wallet/transactions",
                web::get().to(handlers::progress::get_transactions),
            )
            .route(
                "/progress/wallet/spend",
                web::post().to(handlers::progress::spend),
            )
            .route(
                "/progress/minigame/start",
                web::post().to(handlers::progress::minigame_start),
            )
            .route(
                "/progress/minigame/complete",
                web::post().to(handlers::progress::minigame_complete),
            )
            .route(
                "/progress/ad/complete",
                web::post().to(handlers::progress::ad_complete),
            )
            .route("/content/unlock", web::post().to(handlers::content::unlock))
            .route(
                "/content/unlocked",
                web::get().to(handlers::content::list_unlocked),
            )
            .route(
                "/content/access",
                web::get().to(handlers::content::check_access),
            )
            .route(
                "/payment/webhook/stripe",
                web::post().to(handlers::payment::stripe_webhook),
            )
            .route(
                "/payment/subscription",
                web::get().to(handlers::payment::get_subscription),
            )
            .route("/user/me", web::get().to(handlers::user::get_user_info));

        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .service(api_routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
