use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::domain::{Severity, ThreatType};
use crate::entities::{auto_security_logs, prelude::*};

pub struct ThreatRepository {
    conn: DatabaseConnection,
}

impl ThreatRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Appends a threat row and returns its id.
    pub async fn log(
        &self,
        threat_type: ThreatType,
        level: Severity,
        source_ip: &str,
        details: &serde_json::Value,
    ) -> Result<i64> {
        let model = auto_security_logs::ActiveModel {
            threat_type: Set(threat_type.as_str().to_string()),
            threat_level: Set(level.as_str().to_string()),
            source_ip: Set(source_ip.to_string()),
            details: Set(Some(details.to_string())),
            action_taken: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to log threat")?;
        Ok(inserted.id)
    }

    pub async fn set_action_taken(&self, id: i64, action_taken: &str) -> Result<()> {
        let model = auto_security_logs::ActiveModel {
            id: Set(id),
            action_taken: Set(Some(action_taken.to_string())),
            ..Default::default()
        };

        model
            .update(&self.conn)
            .await
            .context("Failed to record threat response")?;
        Ok(())
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<auto_security_logs::Model>> {
        AutoSecurityLogs::find()
            .order_by_desc(auto_security_logs::Column::CreatedAt)
            .order_by_desc(auto_security_logs::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent threats")
    }

    /// Threat counts per level since `since`.
    pub async fn counts_by_level_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>> {
        AutoSecurityLogs::find()
            .select_only()
            .column(auto_security_logs::Column::ThreatLevel)
            .column_as(auto_security_logs::Column::Id.count(), "count")
            .filter(auto_security_logs::Column::CreatedAt.gte(since))
            .group_by(auto_security_logs::Column::ThreatLevel)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to aggregate threat statistics")
    }
}
