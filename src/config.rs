use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Minimum length of the token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub tokens: TokenConfig,

    pub security: SecurityConfig,

    pub oauth: OAuthConfig,

    pub mail: MailConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Number of tokio worker threads. 0 uses the number of CPU cores.
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/aniguard.db".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Peers allowed to supply the client address via `X-Forwarded-For` or
    /// `X-Real-IP`. When empty, forwarded headers are ignored.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HS256 signing secret. Never written back to disk.
    #[serde(skip_serializing)]
    pub secret: String,

    pub identity_ttl_days: i64,

    pub session_ttl_days: i64,

    pub reset_ttl_minutes: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            identity_ttl_days: 30,
            session_ttl_days: 30,
            reset_ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub password_min_length: usize,

    pub lockout: LockoutConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            password_min_length: 8,
            lockout: LockoutConfig::default(),
        }
    }
}

/// Account lockout and IP reputation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failures that lock an account.
    pub max_failed_attempts: i32,

    pub lock_minutes: i64,

    /// Trailing window for the per-IP failure count.
    pub ip_window_minutes: i64,

    /// Failures from one IP within the window that trigger rate limiting.
    pub ip_failure_threshold: u64,

    /// Trailing window scanned by brute-force remediation.
    pub brute_force_window_minutes: i64,

    pub brute_force_threshold: usize,

    pub ip_block_hours: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_minutes: 30,
            ip_window_minutes: 15,
            ip_failure_threshold: 10,
            brute_force_window_minutes: 10,
            brute_force_threshold: 3,
            ip_block_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub yandex: YandexConfig,

    pub vk: VkConfig,

    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YandexConfig {
    pub client_id: String,

    #[serde(skip_serializing)]
    pub client_secret: String,

    pub token_url: String,

    pub info_url: String,
}

impl Default for YandexConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://oauth.yandex.ru/token".to_string(),
            info_url: "https://login.yandex.ru/info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VkConfig {
    pub app_id: String,

    #[serde(skip_serializing)]
    pub app_secret: String,

    pub token_url: String,

    pub api_url: String,

    pub api_version: String,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            token_url: "https://oauth.vk.com/access_token".to_string(),
            api_url: "https://api.vk.com/method".to_string(),
            api_version: "5.131".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: String,

    /// Widget payloads older than this are rejected.
    pub auth_max_age_hours: i64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            auth_max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When disabled, messages are written to the log instead of sent.
    pub enabled: bool,

    pub smtp_host: String,

    pub smtp_port: u16,

    pub smtp_username: String,

    #[serde(skip_serializing)]
    pub smtp_password: String,

    pub from_address: String,

    /// Base URL used to build password reset links.
    pub site_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@localhost".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies environment overrides.
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = paths
            .iter()
            .find(|path| path.exists())
            .map_or_else(
                || {
                    info!("No config file found, using defaults");
                    Ok(Self::default())
                },
                |path| {
                    info!("Loading config from: {}", path.display());
                    Self::load_from_path(path)
                },
            )?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overrides secrets and the database URL from the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 8] = [
            ("JWT_SECRET", &mut self.tokens.secret),
            ("YANDEX_CLIENT_ID", &mut self.oauth.yandex.client_id),
            ("YANDEX_CLIENT_SECRET", &mut self.oauth.yandex.client_secret),
            ("VK_APP_ID", &mut self.oauth.vk.app_id),
            ("VK_APP_SECRET", &mut self.oauth.vk.app_secret),
            ("TELEGRAM_BOT_TOKEN", &mut self.oauth.telegram.bot_token),
            ("SMTP_PASSWORD", &mut self.mail.smtp_password),
            ("DATABASE_URL", &mut self.general.database_url),
        ];

        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("aniguard").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".aniguard").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.secret.is_empty() {
            anyhow::bail!("Token signing secret is not configured (set JWT_SECRET)");
        }

        if self.tokens.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("Token signing secret must be at least {MIN_SECRET_LEN} bytes");
        }

        if self.tokens.identity_ttl_days <= 0 || self.tokens.session_ttl_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.tokens.reset_ttl_minutes <= 0 {
            anyhow::bail!("Reset token lifetime must be positive");
        }

        let lockout = &self.security.lockout;
        if lockout.max_failed_attempts <= 0 || lockout.lock_minutes <= 0 {
            anyhow::bail!("Lockout policy requires positive attempt limit and duration");
        }

        if self.security.password_min_length == 0 {
            anyhow::bail!("Minimum password length must be > 0");
        }

        if self.mail.enabled && self.mail.smtp_host.is_empty() {
            anyhow::bail!("SMTP host cannot be empty when mail is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.lockout.max_failed_attempts, 5);
        assert_eq!(config.security.lockout.lock_minutes, 30);
        assert_eq!(config.security.lockout.ip_failure_threshold, 10);
        assert_eq!(config.tokens.identity_ttl_days, 30);
        assert_eq!(config.tokens.reset_ttl_minutes, 60);
        assert_eq!(config.oauth.telegram.auth_max_age_hours, 24);
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.tokens.secret = "short".to_string();
        assert!(config.validate().is_err());

        config.tokens.secret = SECRET.to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = Config::default();
        config.tokens.secret = SECRET.to_string();
        config.oauth.yandex.client_secret = "yandex-secret".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[tokens]"));
        assert!(toml_str.contains("[security.lockout]"));
        assert!(!toml_str.contains(SECRET));
        assert!(!toml_str.contains("yandex-secret"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security.lockout]
            lock_minutes = 45
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.lockout.lock_minutes, 45);
        assert_eq!(config.security.lockout.max_failed_attempts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("JWT_SECRET", SECRET),
            ("VK_APP_ID", "12345"),
            ("DATABASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.tokens.secret, SECRET);
        assert_eq!(config.oauth.vk.app_id, "12345");
        assert_eq!(config.general.database_url, "sqlite:data/aniguard.db");
    }
}
