//! Domain service for automated threat response.
//!
//! A threat signal is logged first, then remediated according to its type;
//! the narrative of what was done is written back to the same log row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{ClientMeta, SecurityLevel, Severity, ThreatType};
use crate::entities::auto_security_logs;

/// Number of threats returned by [`ThreatService::status`].
pub const RECENT_THREATS_LIMIT: u64 = 20;

#[derive(Debug, Error)]
pub enum ThreatError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ThreatError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ThreatError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreatSignal {
    pub threat_type: ThreatType,
    #[serde(default)]
    pub threat_level: Severity,
    /// Overrides the caller's address as the threat source.
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatResponse {
    pub log_id: i64,
    pub threat_detected: ThreatType,
    pub threat_level: Severity,
    pub source_ip: String,
    pub actions_taken: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatSummary {
    pub id: i64,
    pub threat_type: String,
    pub threat_level: String,
    pub source_ip: String,
    pub action_taken: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<auto_security_logs::Model> for ThreatSummary {
    fn from(model: auto_security_logs::Model) -> Self {
        Self {
            id: model.id,
            threat_type: model.threat_type,
            threat_level: model.threat_level,
            source_ip: model.source_ip,
            action_taken: model.action_taken,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityStatus {
    pub recent_threats: Vec<ThreatSummary>,
    /// Threat counts per level over the last 24 hours.
    pub threat_stats: BTreeMap<String, i64>,
    pub blocked_ips: Vec<String>,
    pub security_level: SecurityLevel,
}

#[async_trait::async_trait]
pub trait ThreatService: Send + Sync {
    /// Logs and remediates a threat signal.
    ///
    /// # Errors
    ///
    /// Returns [`ThreatError::Validation`] when a user-targeted threat lacks
    /// `details.user_id`. Nothing is logged in that case.
    async fn respond(
        &self,
        signal: ThreatSignal,
        client: &ClientMeta,
    ) -> Result<ThreatResponse, ThreatError>;

    async fn status(&self) -> Result<SecurityStatus, ThreatError>;
}
