use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::info;

use crate::domain::{AuthProvider, ClientMeta, Severity, ThreatType};
use crate::entities::{auto_security_logs, login_attempts, security_logs, sessions, users};

pub mod migrator;
pub mod repositories;

pub use repositories::audit::IP_BLOCKED;
pub use repositories::user::{FailedLogin, NewUser, ProfileChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(StdDuration::from_secs(10))
            .acquire_timeout(StdDuration::from_secs(10))
            .idle_timeout(StdDuration::from_secs(300))
            .max_lifetime(StdDuration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    fn reset_token_repo(&self) -> repositories::reset_token::ResetTokenRepository {
        repositories::reset_token::ResetTokenRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    fn threat_repo(&self) -> repositories::threat::ThreatRepository {
        repositories::threat::ThreatRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<users::Model>> {
        self.user_repo().get_by_provider(provider, provider_id).await
    }

    pub async fn create_user(&self, user: NewUser) -> Result<Option<users::Model>> {
        self.user_repo().create(user).await
    }

    pub async fn record_failed_login(
        &self,
        user_id: &str,
        max_failures: i32,
        lock_for: Duration,
    ) -> Result<FailedLogin> {
        self.user_repo()
            .record_failed_login(user_id, max_failures, lock_for)
            .await
    }

    pub async fn record_successful_login(&self, user_id: &str) -> Result<()> {
        self.user_repo().record_successful_login(user_id).await
    }

    pub async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        self.user_repo().touch_last_login(user_id).await
    }

    pub async fn set_password(&self, user_id: &str, password_hash: String) -> Result<bool> {
        self.user_repo().set_password(user_id, password_hash).await
    }

    pub async fn rotate_password(&self, user_id: &str, password_hash: String) -> Result<bool> {
        self.user_repo().rotate_password(user_id, password_hash).await
    }

    pub async fn lock_user_until(&self, user_id: &str, until: DateTime<Utc>) -> Result<bool> {
        self.user_repo().lock_until(user_id, until).await
    }

    pub async fn require_two_factor(&self, user_id: &str) -> Result<bool> {
        self.user_repo().require_two_factor(user_id).await
    }

    pub async fn require_password_reset(&self, user_id: &str) -> Result<bool> {
        self.user_repo().require_password_reset(user_id).await
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        changes: ProfileChanges,
    ) -> Result<Option<users::Model>> {
        self.user_repo().update_profile(user_id, changes).await
    }

    pub async fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool> {
        self.user_repo().set_admin(email, is_admin).await
    }

    pub async fn unlock_user(&self, email: &str) -> Result<bool> {
        self.user_repo().unlock(email).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn count_locked_users(&self) -> Result<u64> {
        self.user_repo().count_locked().await
    }

    // Sessions

    pub async fn create_session(
        &self,
        user_id: &str,
        token_hash: String,
        client: &ClientMeta,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.session_repo()
            .create(user_id, token_hash, client, expires_at)
            .await
    }

    pub async fn find_active_session(&self, token_hash: &str) -> Result<Option<sessions::Model>> {
        self.session_repo().find_active(token_hash).await
    }

    pub async fn expire_session(&self, token_hash: &str) -> Result<u64> {
        self.session_repo().expire(token_hash).await
    }

    pub async fn expire_user_sessions(&self, user_id: &str) -> Result<u64> {
        self.session_repo().expire_all_for_user(user_id).await
    }

    // Password reset

    pub async fn create_reset_token(
        &self,
        user_id: &str,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.reset_token_repo()
            .create(user_id, token_hash, expires_at)
            .await
    }

    pub async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: String,
    ) -> Result<Option<String>> {
        self.reset_token_repo()
            .redeem(token_hash, password_hash)
            .await
    }

    // Audit trail

    pub async fn record_login_attempt(
        &self,
        email: Option<&str>,
        client: &ClientMeta,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        self.audit_repo()
            .record_login_attempt(email, client, failure_reason)
            .await
    }

    pub async fn block_ip(&self, ip: &str) -> Result<()> {
        self.audit_repo().block_ip(ip).await
    }

    pub async fn count_failed_from_ip(&self, ip: &str, since: DateTime<Utc>) -> Result<u64> {
        self.audit_repo().count_failed_from_ip(ip, since).await
    }

    pub async fn is_ip_blocked(&self, ip: &str, since: DateTime<Utc>) -> Result<bool> {
        self.audit_repo().is_ip_blocked(ip, since).await
    }

    pub async fn failed_attempts_from_ip(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<login_attempts::Model>> {
        self.audit_repo().failed_attempts_from_ip(ip, since).await
    }

    pub async fn blocked_ips_since(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        self.audit_repo().blocked_ips_since(since).await
    }

    pub async fn record_security_event(
        &self,
        user_id: Option<&str>,
        event_type: &str,
        ip: &str,
        severity: Severity,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        self.audit_repo()
            .record_security_event(user_id, event_type, ip, severity, details)
            .await
    }

    pub async fn security_events_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<security_logs::Model>> {
        self.audit_repo()
            .security_events_for_user(user_id, limit)
            .await
    }

    // Threats

    pub async fn log_threat(
        &self,
        threat_type: ThreatType,
        level: Severity,
        source_ip: &str,
        details: &serde_json::Value,
    ) -> Result<i64> {
        self.threat_repo()
            .log(threat_type, level, source_ip, details)
            .await
    }

    pub async fn set_threat_action(&self, id: i64, action_taken: &str) -> Result<()> {
        self.threat_repo().set_action_taken(id, action_taken).await
    }

    pub async fn recent_threats(&self, limit: u64) -> Result<Vec<auto_security_logs::Model>> {
        self.threat_repo().recent(limit).await
    }

    pub async fn threat_counts_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>> {
        self.threat_repo().counts_by_level_since(since).await
    }
}
