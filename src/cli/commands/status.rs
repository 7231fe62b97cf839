//! Security status command handler

use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let users = state.store.count_users().await?;
    let locked = state.store.count_locked_users().await?;
    let status = state.threats.status().await?;

    println!("Security level: {:?}", status.security_level);
    println!("Accounts: {users} ({locked} locked)");
    println!();

    println!("Threats in the last 24h");
    println!("{:-<50}", "");
    if status.threat_stats.is_empty() {
        println!("  none");
    }
    for (level, count) in &status.threat_stats {
        println!("  {level:<10} {count}");
    }
    println!();

    println!("Blocked IPs ({})", status.blocked_ips.len());
    println!("{:-<50}", "");
    for ip in &status.blocked_ips {
        println!("  {ip}");
    }
    println!();

    println!("Recent threats");
    println!("{:-<50}", "");
    for threat in &status.recent_threats {
        println!(
            "  #{} {} [{}] from {}",
            threat.id, threat.threat_type, threat.threat_level, threat.source_ip
        );
        if let Some(action) = &threat.action_taken {
            println!("      {action}");
        }
    }

    Ok(())
}
