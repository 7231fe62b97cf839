use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One local account per federated identity
        manager
            .create_index(
                Index::create()
                    .name("idx_users_provider_identity")
                    .table(UsersTable::Table)
                    .col(UsersTable::Provider)
                    .col(UsersTable::ProviderId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SessionsTable::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionsTable::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionsTable::UserId).string().not_null())
                    .col(
                        ColumnDef::new(SessionsTable::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SessionsTable::IpAddress).string().not_null())
                    .col(ColumnDef::new(SessionsTable::UserAgent).string().not_null())
                    .col(
                        ColumnDef::new(SessionsTable::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionsTable::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_user")
                            .from(SessionsTable::Table, SessionsTable::UserId)
                            .to(UsersTable::Table, UsersTable::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_user_id")
                    .table(SessionsTable::Table)
                    .col(SessionsTable::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ResetTokensTable::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ResetTokensTable::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ResetTokensTable::UserId).string().not_null())
                    .col(
                        ColumnDef::new(ResetTokensTable::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ResetTokensTable::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ResetTokensTable::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ResetTokensTable::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_password_reset_tokens_user")
                            .from(ResetTokensTable::Table, ResetTokensTable::UserId)
                            .to(UsersTable::Table, UsersTable::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ResetTokensTable::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SessionsTable::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsersTable::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum UsersTable {
    #[iden = "users"]
    Table,
    Id,
    Provider,
    ProviderId,
}

#[derive(Iden)]
enum SessionsTable {
    #[iden = "sessions"]
    Table,
    Id,
    UserId,
    TokenHash,
    IpAddress,
    UserAgent,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
enum ResetTokensTable {
    #[iden = "password_reset_tokens"]
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    Used,
    CreatedAt,
}
