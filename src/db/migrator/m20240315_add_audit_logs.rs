use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoginAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginAttempts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginAttempts::Email).string().null())
                    .col(ColumnDef::new(LoginAttempts::IpAddress).string().not_null())
                    .col(ColumnDef::new(LoginAttempts::UserAgent).string().null())
                    .col(ColumnDef::new(LoginAttempts::Success).boolean().not_null())
                    .col(ColumnDef::new(LoginAttempts::FailureReason).string().null())
                    .col(
                        ColumnDef::new(LoginAttempts::AttemptedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // IP reputation and brute-force scans filter on ip + time
        manager
            .create_index(
                Index::create()
                    .name("idx_login_attempts_ip_time")
                    .table(LoginAttempts::Table)
                    .col(LoginAttempts::IpAddress)
                    .col(LoginAttempts::AttemptedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SecurityLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SecurityLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SecurityLogs::UserId).string().null())
                    .col(ColumnDef::new(SecurityLogs::EventType).string().not_null())
                    .col(ColumnDef::new(SecurityLogs::IpAddress).string().not_null())
                    .col(ColumnDef::new(SecurityLogs::Severity).string().not_null())
                    .col(ColumnDef::new(SecurityLogs::Details).string().null())
                    .col(
                        ColumnDef::new(SecurityLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_security_logs_created_at")
                    .table(SecurityLogs::Table)
                    .col(SecurityLogs::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AutoSecurityLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AutoSecurityLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AutoSecurityLogs::ThreatType).string().not_null())
                    .col(ColumnDef::new(AutoSecurityLogs::ThreatLevel).string().not_null())
                    .col(ColumnDef::new(AutoSecurityLogs::SourceIp).string().not_null())
                    .col(ColumnDef::new(AutoSecurityLogs::Details).string().null())
                    .col(ColumnDef::new(AutoSecurityLogs::ActionTaken).string().null())
                    .col(
                        ColumnDef::new(AutoSecurityLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auto_security_logs_created_at")
                    .table(AutoSecurityLogs::Table)
                    .col(AutoSecurityLogs::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AutoSecurityLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SecurityLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginAttempts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum LoginAttempts {
    Table,
    Id,
    Email,
    IpAddress,
    UserAgent,
    Success,
    FailureReason,
    AttemptedAt,
}

#[derive(Iden)]
enum SecurityLogs {
    Table,
    Id,
    UserId,
    EventType,
    IpAddress,
    Severity,
    Details,
    CreatedAt,
}

#[derive(Iden)]
enum AutoSecurityLogs {
    Table,
    Id,
    ThreatType,
    ThreatLevel,
    SourceIp,
    Details,
    ActionTaken,
    CreatedAt,
}
