//! Domain types for account security with strong typing.
//!
//! Values that are persisted as plain strings (provider markers, severity
//! tags, threat types) are modelled as closed enums here and converted at the
//! repository boundary.

pub mod threat;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use threat::{SecurityLevel, ThreatType};

/// Origin of an account: local email/password or a federated provider.
///
/// The `(provider, provider_id)` pair identifies an account uniquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Yandex,
    Telegram,
    Vk,
}

impl AuthProvider {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Yandex => "yandex",
            Self::Telegram => "telegram",
            Self::Vk => "vk",
        }
    }

    /// Returns true for third-party identity providers.
    #[must_use]
    pub const fn is_federated(&self) -> bool {
        !matches!(self, Self::Email)
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "yandex" => Ok(Self::Yandex),
            "telegram" => Ok(Self::Telegram),
            "vk" => Ok(Self::Vk),
            other => Err(format!("Unknown auth provider: {other}")),
        }
    }
}

/// Severity tag shared by security events and threat signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Weight of one event at this level in the overall security score.
    #[must_use]
    pub const fn weight(&self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 5,
            Self::High => 10,
            Self::Critical => 20,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("Unknown severity: {s}"))
    }
}

/// Metadata about the caller, captured once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

impl ClientMeta {
    pub const UNKNOWN: &'static str = "unknown";

    #[must_use]
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }

    /// False when the peer address could not be resolved.
    #[must_use]
    pub fn has_known_ip(&self) -> bool {
        !self.ip.is_empty() && self.ip != Self::UNKNOWN
    }
}

impl Default for ClientMeta {
    fn default() -> Self {
        Self::new(Self::UNKNOWN, Self::UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_peer_has_no_known_ip() {
        assert!(!ClientMeta::default().has_known_ip());
        assert!(ClientMeta::new("203.0.113.10", "curl").has_known_ip());
    }

    #[test]
    fn provider_round_trips_through_str() {
        for provider in [
            AuthProvider::Email,
            AuthProvider::Yandex,
            AuthProvider::Telegram,
            AuthProvider::Vk,
        ] {
            assert_eq!(provider.as_str().parse::<AuthProvider>(), Ok(provider));
        }
        assert!("github".parse::<AuthProvider>().is_err());
        assert!(!AuthProvider::Email.is_federated());
        assert!(AuthProvider::Vk.is_federated());
    }

    #[test]
    fn severity_parses_and_orders() {
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert!("urgent".parse::<Severity>().is_err());
        assert!(Severity::Critical > Severity::Low);
        assert_eq!(Severity::default(), Severity::Low);
    }

    #[test]
    fn severity_deserializes_lowercase() {
        let level: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(level, Severity::High);
        assert!(serde_json::from_str::<Severity>("\"HIGH\"").is_err());
    }
}
