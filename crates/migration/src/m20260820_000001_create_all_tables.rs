use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string())
                    .col(ColumnDef::new(Users::Name).string())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(ColumnDef::new(Users::GoogleId).string().unique_key())
                    .col(ColumnDef::new(Users::GithubId).string().unique_key())
                    .col(ColumnDef::new(Users::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Create wallets table (1:1 with users)
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::TotalEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::TotalSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::TokensEarnedToday)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Wallets::LastResetDate).string().not_null())
                    .col(ColumnDef::new(Wallets::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallets_user_id")
                            .from(Wallets::Table, Wallets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create wallet_transactions table (append-only audit log)
        manager
            .create_table(
                Table::create()
                    .table(WalletTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::TxType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::Metadata).text())
                    .col(
                        ColumnDef::new(WalletTransactions::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transactions_user_id")
                            .from(WalletTransactions::Table, WalletTransactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite cannot represent a non-unique index as a table-level CONSTRAINT,
        // so we create these indexes separately.
        manager
            .create_index(
                Index::create()
                    .name("idx_wallet_transactions_user_created")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::UserId)
                    .col(WalletTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create refresh_tokens table
        manager
            .create_table(
                Table::create()
                    .table(RefreshTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RefreshTokens::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RefreshTokens::UserId).string().not_null())
                    .col(
                        ColumnDef::new(RefreshTokens::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(RefreshTokens::FamilyId).string().not_null())
                    .col(
                        ColumnDef::new(RefreshTokens::ExpiresAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RefreshTokens::Revoked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RefreshTokens::ReplacedByTokenId).string())
                    .col(ColumnDef::new(RefreshTokens::DeviceInfo).string())
                    .col(
                        ColumnDef::new(RefreshTokens::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_refresh_tokens_user_id")
                            .from(RefreshTokens::Table, RefreshTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_refresh_tokens_family_id")
                    .table(RefreshTokens::Table)
                    .col(RefreshTokens::FamilyId)
                    .to_owned(),
            )
            .await?;

        // Create minigame_sessions table
        manager
            .create_table(
                Table::create()
                    .table(MinigameSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MinigameSessions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MinigameSessions::UserId).string().not_null())
                    .col(
                        ColumnDef::new(MinigameSessions::GameType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MinigameSessions::Status).string().not_null())
                    .col(
                        ColumnDef::new(MinigameSessions::StartedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MinigameSessions::ExpiresAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MinigameSessions::Result).text())
                    .col(ColumnDef::new(MinigameSessions::CompletedAt).big_integer())
                    .col(
                        ColumnDef::new(MinigameSessions::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_minigame_sessions_user_id")
                            .from(MinigameSessions::Table, MinigameSessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_minigame_sessions_user_id")
                    .table(MinigameSessions::Table)
                    .col(MinigameSessions::UserId)
                    .to_owned(),
            )
            .await?;

        // Create entitlements table
        manager
            .create_table(
                Table::create()
                    .table(Entitlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entitlements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entitlements::UserId).string().not_null())
                    .col(ColumnDef::new(Entitlements::Provider).string().not_null())
                    .col(
                        ColumnDef::new(Entitlements::ProviderSubscriptionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Entitlements::ProductId).string())
                    .col(ColumnDef::new(Entitlements::Status).string().not_null())
                    .col(
                        ColumnDef::new(Entitlements::ExpiresAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Entitlements::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Entitlements::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_entitlements_user_id")
                            .from(Entitlements::Table, Entitlements::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert target for webhook-driven grants.
        manager
            .create_index(
                Index::create()
                    .name("uidx_entitlements_user_subscription")
                    .table(Entitlements::Table)
                    .col(Entitlements::UserId)
                    .col(Entitlements::ProviderSubscriptionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create unlocked_content table
        manager
            .create_table(
                Table::create()
                    .table(UnlockedContent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnlockedContent::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UnlockedContent::UserId).string().not_null())
                    .col(
                        ColumnDef::new(UnlockedContent::ContentType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnlockedContent::ContentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnlockedContent::TokensSpent)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnlockedContent::UnlockedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_unlocked_content_user_id")
                            .from(UnlockedContent::Table, UnlockedContent::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Conflict target for the idempotent unlock insert.
        manager
            .create_index(
                Index::create()
                    .name("uidx_unlocked_content_user_item")
                    .table(UnlockedContent::Table)
                    .col(UnlockedContent::UserId)
                    .col(UnlockedContent::ContentType)
                    .col(UnlockedContent::ContentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create login_history table
        manager
            .create_table(
                Table::create()
                    .table(LoginHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginHistory::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginHistory::UserId).string().not_null())
                    .col(ColumnDef::new(LoginHistory::Ip).string())
                    .col(ColumnDef::new(LoginHistory::UserAgent).string())
                    .col(
                        ColumnDef::new(LoginHistory::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_history_user_id")
                            .from(LoginHistory::Table, LoginHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create processed_events table (durable idempotency keys)
        manager
            .create_table(
                Table::create()
                    .table(ProcessedEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessedEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProcessedEvents::Provider)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProcessedEvents::EventId).string().not_null())
                    .col(
                        ColumnDef::new(ProcessedEvents::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Conflict target for first-writer-wins event claims.
        manager
            .create_index(
                Index::create()
                    .name("uidx_processed_events_provider_event")
                    .table(ProcessedEvents::Table)
                    .col(ProcessedEvents::Provider)
                    .col(ProcessedEvents::EventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order (due to foreign keys)
        manager
            .drop_table(Table::drop().table(ProcessedEvents::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LoginHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(UnlockedContent::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Entitlements::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(MinigameSessions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    Role,
    GoogleId,
    GithubId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Wallets {
    Table,
    UserId,
    Balance,
    TotalEarned,
    TotalSpent,
    TokensEarnedToday,
    LastResetDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WalletTransactions {
    Table,
    Id,
    UserId,
    TxType,
    Amount,
    BalanceAfter,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    FamilyId,
    ExpiresAt,
    Revoked,
    ReplacedByTokenId,
    DeviceInfo,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MinigameSessions {
    Table,
    Id,
    UserId,
    GameType,
    Status,
    StartedAt,
    ExpiresAt,
    Result,
    CompletedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Entitlements {
    Table,
    Id,
    UserId,
    Provider,
    ProviderSubscriptionId,
    ProductId,
    Status,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UnlockedContent {
    Table,
    Id,
    UserId,
    ContentType,
    ContentId,
    TokensSpent,
    UnlockedAt,
}

#[derive(DeriveIden)]
enum LoginHistory {
    Table,
    Id,
    UserId,
    Ip,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProcessedEvents {
    Table,
    Id,
    Provider,
    EventId,
    CreatedAt,
}
