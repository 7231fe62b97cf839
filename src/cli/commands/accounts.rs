//! Account maintenance command handlers

use crate::config::Config;
use crate::db::Store;
use crate::services::auth_service::normalize_email;

pub async fn cmd_promote(config: &Config, email: &str, revoke: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_url).await?;
    let email = normalize_email(email);

    if !store.set_admin(&email, !revoke).await? {
        println!("No account found for {email}");
        return Ok(());
    }

    if revoke {
        println!("✓ Admin rights revoked from {email}");
    } else {
        println!("✓ {email} is now an admin");
    }
    println!("Existing tokens keep their old claims until they expire.");

    Ok(())
}

pub async fn cmd_unlock(config: &Config, email: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_url).await?;
    let email = normalize_email(email);

    if store.unlock_user(&email).await? {
        println!("✓ {email} unlocked, failed attempts reset");
    } else {
        println!("No account found for {email}");
    }

    Ok(())
}
