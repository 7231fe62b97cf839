use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::domain::{ClientMeta, Severity};
use crate::entities::{login_attempts, prelude::*, security_logs};

/// Failure reason that marks a synthetic attempt row as an IP block.
pub const IP_BLOCKED: &str = "IP_BLOCKED";

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn record_login_attempt(
        &self,
        email: Option<&str>,
        client: &ClientMeta,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        let model = login_attempts::ActiveModel {
            email: Set(email.map(str::to_string)),
            ip_address: Set(client.ip.clone()),
            user_agent: Set(Some(client.user_agent.clone())),
            success: Set(failure_reason.is_none()),
            failure_reason: Set(failure_reason.map(str::to_string)),
            attempted_at: Set(Utc::now()),
            ..Default::default()
        };

        LoginAttempts::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to record login attempt")?;
        Ok(())
    }

    /// Inserts the synthetic failed attempt that blocks `ip`.
    pub async fn block_ip(&self, ip: &str) -> Result<()> {
        let model = login_attempts::ActiveModel {
            email: Set(None),
            ip_address: Set(ip.to_string()),
            user_agent: Set(None),
            success: Set(false),
            failure_reason: Set(Some(IP_BLOCKED.to_string())),
            attempted_at: Set(Utc::now()),
            ..Default::default()
        };

        LoginAttempts::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to block IP")?;
        Ok(())
    }

    /// Failed attempts from `ip` since `since`, excluding block markers.
    pub async fn count_failed_from_ip(&self, ip: &str, since: DateTime<Utc>) -> Result<u64> {
        LoginAttempts::find()
            .filter(login_attempts::Column::IpAddress.eq(ip))
            .filter(login_attempts::Column::Success.eq(false))
            .filter(
                login_attempts::Column::FailureReason
                    .ne(IP_BLOCKED)
                    .or(login_attempts::Column::FailureReason.is_null()),
            )
            .filter(login_attempts::Column::AttemptedAt.gte(since))
            .count(&self.conn)
            .await
            .context("Failed to count failed attempts for IP")
    }

    pub async fn is_ip_blocked(&self, ip: &str, since: DateTime<Utc>) -> Result<bool> {
        let blocks = LoginAttempts::find()
            .filter(login_attempts::Column::IpAddress.eq(ip))
            .filter(login_attempts::Column::FailureReason.eq(IP_BLOCKED))
            .filter(login_attempts::Column::AttemptedAt.gte(since))
            .count(&self.conn)
            .await
            .context("Failed to check IP block")?;
        Ok(blocks > 0)
    }

    /// Failed attempts from `ip` that carry an email, newest first.
    pub async fn failed_attempts_from_ip(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<login_attempts::Model>> {
        LoginAttempts::find()
            .filter(login_attempts::Column::IpAddress.eq(ip))
            .filter(login_attempts::Column::Success.eq(false))
            .filter(login_attempts::Column::Email.is_not_null())
            .filter(login_attempts::Column::AttemptedAt.gte(since))
            .order_by_desc(login_attempts::Column::AttemptedAt)
            .all(&self.conn)
            .await
            .context("Failed to query failed login attempts")
    }

    pub async fn blocked_ips_since(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        LoginAttempts::find()
            .select_only()
            .column(login_attempts::Column::IpAddress)
            .distinct()
            .filter(login_attempts::Column::FailureReason.eq(IP_BLOCKED))
            .filter(login_attempts::Column::AttemptedAt.gte(since))
            .order_by_asc(login_attempts::Column::IpAddress)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query blocked IPs")
    }

    pub async fn record_security_event(
        &self,
        user_id: Option<&str>,
        event_type: &str,
        ip: &str,
        severity: Severity,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let model = security_logs::ActiveModel {
            user_id: Set(user_id.map(str::to_string)),
            event_type: Set(event_type.to_string()),
            ip_address: Set(ip.to_string()),
            severity: Set(severity.as_str().to_string()),
            details: Set(details.map(|value| value.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        SecurityLogs::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to record security event")?;
        Ok(())
    }

    pub async fn security_events_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<security_logs::Model>> {
        SecurityLogs::find()
            .filter(security_logs::Column::UserId.eq(user_id))
            .order_by_desc(security_logs::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query security events")
    }
}
