//! `SeaORM` implementation of the `ThreatService` trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::counter;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{Config, LockoutConfig, SecurityConfig};
use crate::db::Store;
use crate::domain::{AuthProvider, ClientMeta, SecurityLevel, ThreatType};
use crate::services::mailer::{self, MailMessage, Mailer};
use crate::services::password::{generate_password, hash_password};
use crate::services::threat_service::{
    RECENT_THREATS_LIMIT, SecurityStatus, ThreatError, ThreatResponse, ThreatService,
    ThreatSignal, ThreatSummary,
};

pub struct SeaOrmThreatService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    security: SecurityConfig,
}

impl SeaOrmThreatService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        Self {
            store,
            mailer,
            security: config.security.clone(),
        }
    }

    const fn lockout(&self) -> &LockoutConfig {
        &self.security.lockout
    }

    /// Rotates the password of every local account with enough recent
    /// failures from `ip`, and mails the replacement to the owner.
    async fn rotate_brute_forced(&self, ip: &str) -> Result<Vec<String>, ThreatError> {
        let since = Utc::now() - Duration::minutes(self.lockout().brute_force_window_minutes);
        let attempts = self.store.failed_attempts_from_ip(ip, since).await?;

        let mut failures: BTreeMap<String, usize> = BTreeMap::new();
        for email in attempts.into_iter().filter_map(|attempt| attempt.email) {
            *failures.entry(email).or_default() += 1;
        }

        let mut actions = Vec::new();
        for (email, count) in failures {
            if count < self.lockout().brute_force_threshold {
                continue;
            }

            let Some(user) = self.store.get_user_by_email(&email).await? else {
                continue;
            };
            if user.provider != AuthProvider::Email.as_str() {
                continue;
            }

            let new_password = generate_password();
            let password_hash = hash_password(&new_password, &self.security).await?;
            if !self.store.rotate_password(&user.id, password_hash).await? {
                continue;
            }

            match user.email.as_deref() {
                Some(address) => {
                    mailer::deliver(
                        self.mailer.as_ref(),
                        MailMessage::password_rotated(address, &new_password),
                    )
                    .await;
                }
                None => warn!(user_id = %user.id, "rotated password but account has no email"),
            }

            info!(user_id = %user.id, failures = count, "password rotated after brute force");
            actions.push(format!("Password rotated for user {}", user.username));
        }

        if actions.is_empty() {
            actions.push("No accounts matched the brute-force pattern".to_string());
        }
        Ok(actions)
    }

    /// Runs a per-user remediation, reporting a no-op for unknown users.
    async fn remediate_user(
        &self,
        threat_type: ThreatType,
        user_id: &str,
    ) -> Result<String, ThreatError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Ok(format!("User {user_id} not found; no action taken"));
        }

        let action = match threat_type {
            ThreatType::SuspiciousLoginPattern => {
                self.store.require_two_factor(user_id).await?;
                format!("Two-factor authentication required for user {user_id}")
            }
            ThreatType::PasswordLeakDetected => {
                self.store.require_password_reset(user_id).await?;
                format!("Password reset required for user {user_id}")
            }
            ThreatType::MultipleFailedAttempts => {
                let minutes = self.lockout().lock_minutes;
                self.store
                    .lock_user_until(user_id, Utc::now() + Duration::minutes(minutes))
                    .await?;
                format!("Account {user_id} locked for {minutes} minutes")
            }
            ThreatType::SuspiciousActivity => {
                let ended = self.store.expire_user_sessions(user_id).await?;
                format!("Ended {ended} active sessions for user {user_id}")
            }
            other => {
                return Err(ThreatError::Internal(format!(
                    "{other} is not a per-user threat"
                )));
            }
        };

        Ok(action)
    }
}

fn target_user(signal: &ThreatSignal) -> Option<String> {
    let user_id = match signal.details.get("user_id") {
        Some(Value::String(id)) => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    (!user_id.is_empty()).then_some(user_id)
}

#[async_trait]
impl ThreatService for SeaOrmThreatService {
    async fn respond(
        &self,
        signal: ThreatSignal,
        client: &ClientMeta,
    ) -> Result<ThreatResponse, ThreatError> {
        let target = target_user(&signal);
        let ThreatSignal {
            threat_type,
            threat_level,
            source_ip,
            details,
        } = signal;

        let source_ip = source_ip
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| client.ip.clone());
        let details = Value::Object(details);

        let log_id = self
            .store
            .log_threat(threat_type, threat_level, &source_ip, &details)
            .await?;
        counter!(
            "security_threats_total",
            "threat_type" => threat_type.as_str(),
            "threat_level" => threat_level.as_str()
        )
        .increment(1);

        if threat_type.targets_user() && target.is_none() {
            self.store
                .set_threat_action(log_id, "No user_id supplied; no action taken")
                .await?;
            return Err(ThreatError::Validation(format!(
                "details.user_id is required for {threat_type}"
            )));
        }

        let actions = match (threat_type, target.as_deref()) {
            (ThreatType::BruteForceDetected, _) => self.rotate_brute_forced(&source_ip).await?,
            (ThreatType::SqlInjectionAttempt, _) => {
                self.store.block_ip(&source_ip).await?;
                vec![format!(
                    "IP {source_ip} blocked for {} hours",
                    self.lockout().ip_block_hours
                )]
            }
            (ThreatType::DdosDetected, _) => {
                // Flag only; request throttling is enforced upstream
                self.store
                    .record_security_event(
                        None,
                        "rate_limit_enabled",
                        &source_ip,
                        threat_level,
                        Some(details.clone()),
                    )
                    .await?;
                vec![format!("Rate limiting enabled for IP {source_ip}")]
            }
            (other, Some(user_id)) => vec![self.remediate_user(other, user_id).await?],
            (other, None) => {
                return Err(ThreatError::Internal(format!(
                    "no remediation for {other}"
                )));
            }
        };

        self.store
            .set_threat_action(log_id, &actions.join("; "))
            .await?;

        warn!(
            threat_type = %threat_type,
            threat_level = %threat_level,
            source_ip = %source_ip,
            actions = actions.len(),
            "threat handled"
        );

        Ok(ThreatResponse {
            log_id,
            threat_detected: threat_type,
            threat_level,
            source_ip,
            actions_taken: actions,
            timestamp: Utc::now(),
        })
    }

    async fn status(&self) -> Result<SecurityStatus, ThreatError> {
        let now = Utc::now();

        let recent_threats = self
            .store
            .recent_threats(RECENT_THREATS_LIMIT)
            .await?
            .into_iter()
            .map(ThreatSummary::from)
            .collect();

        let counts = self.store.threat_counts_since(now - Duration::hours(24)).await?;
        let security_level =
            SecurityLevel::from_counts(counts.iter().map(|(level, count)| (level.as_str(), *count)));
        let threat_stats = counts.into_iter().collect();

        let blocked_ips = self
            .store
            .blocked_ips_since(now - Duration::hours(self.lockout().ip_block_hours))
            .await?;

        Ok(SecurityStatus {
            recent_threats,
            threat_stats,
            blocked_ips,
            security_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use serde_json::json;

    fn signal(value: serde_json::Value) -> ThreatSignal {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn user_id_is_read_from_details() {
        let missing = signal(json!({ "threat_type": "password_leak_detected" }));
        assert_eq!(target_user(&missing), None);

        let blank = signal(json!({
            "threat_type": "suspicious_activity",
            "details": { "user_id": "  " }
        }));
        assert_eq!(target_user(&blank), None);

        let present = signal(json!({
            "threat_type": "multiple_failed_attempts",
            "details": { "user_id": "abc" }
        }));
        assert_eq!(target_user(&present).as_deref(), Some("abc"));

        let numeric = signal(json!({
            "threat_type": "suspicious_activity",
            "details": { "user_id": 42 }
        }));
        assert_eq!(target_user(&numeric).as_deref(), Some("42"));
    }

    #[test]
    fn only_account_threats_target_a_user() {
        let sql = signal(json!({ "threat_type": "sql_injection_attempt", "threat_level": "critical" }));
        assert!(!sql.threat_type.targets_user());
        assert_eq!(sql.threat_level, Severity::Critical);
        assert!(ThreatType::PasswordLeakDetected.targets_user());
    }

    #[test]
    fn unknown_threat_type_is_rejected() {
        let parsed: Result<ThreatSignal, _> =
            serde_json::from_value(json!({ "threat_type": "port_scan" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn level_defaults_to_low() {
        let ddos = signal(json!({ "threat_type": "ddos_detected" }));
        assert_eq!(ddos.threat_level, Severity::Low);
        assert!(ddos.details.is_empty());
    }
}
