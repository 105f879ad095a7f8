use chrono::Utc;
use clap::Parser;
use entity::user;
use mindcase_core::password;
use mindcase_lib::{
    config::{Command, Config},
    server::run_server,
};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    let log_level = match &config.command {
        Command::Serve(serve_config) => serve_config.log_level.as_str(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match config.command {
        Command::Serve(serve_config) => {
            run_server(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            run_migrations(&database_url).await?;
        }
        Command::CreateUser {
            email,
            password,
            name,
        } => {
            create_user(&email, &password, name).await?;
        }
        Command::ListUsers => {
            list_users().await?;
        }
    }

    Ok(())
}

fn database_url_from_env() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./mindcase.db?mode=rwc".to_string())
}

async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;

    println!("✅ Database migrations completed successfully!");

    Ok(())
}

async fn create_user(email: &str, password: &str, name: Option<String>) -> anyhow::Result<()> {
    let db = Database::connect(database_url_from_env()).await?;

    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        anyhow::bail!("Invalid email address: {email}");
    }
    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await?;
    if existing.is_some() {
        anyhow::bail!("User '{}' already exists", email);
    }

    log::info!("Hashing password...");
    let password_hash = password::hash_password(password)?;

    let now = Utc::now().timestamp();
    let new_user = user::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        email: Set(Some(email.clone())),
        password_hash: Set(Some(password_hash)),
        name: Set(name),
        role: Set(user::ROLE_USER.to_string()),
        google_id: Set(None),
        github_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = new_user.insert(&db).await?;

    println!("✅ User created successfully!");
    println!("   ID: {}", created.id);
    println!("   Email: {}", email);

    Ok(())
}

async fn list_users() -> anyhow::Result<()> {
    let db = Database::connect(database_url_from_env()).await?;

    let users = user::Entity::find().all(&db).await?;

    if users.is_empty() {
        println!("No users found.");
    } else {
        println!("Users:");
        println!("{:<38} {:<30} {:<6}", "ID", "Email", "Role");
        println!("{}", "-".repeat(76));
        for user in users {
            println!(
                "{:<38} {:<30} {:<6}",
                user.id,
                user.email.as_deref().unwrap_or("(guest)"),
                user.role
            );
        }
    }

    Ok(())
}
