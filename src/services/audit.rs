use anyhow::Result;
use tracing::{info, warn};

use crate::db::Store;
use crate::domain::{ClientMeta, Severity};

/// Appends a security log row and mirrors it to the tracing output.
pub async fn security_event(
    store: &Store,
    user_id: Option<&str>,
    event: &str,
    client: &ClientMeta,
    severity: Severity,
    details: serde_json::Value,
) -> Result<()> {
    if severity >= Severity::High {
        warn!(user_id = ?user_id, ip = %client.ip, event, %severity, "security event");
    } else {
        info!(user_id = ?user_id, ip = %client.ip, event, %severity, "security event");
    }

    store
        .record_security_event(user_id, event, &client.ip, severity, Some(details))
        .await
}
