//! Threat signal vocabulary and the derived overall security level.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Severity;

/// Kinds of threat signals the response engine knows how to remediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    BruteForceDetected,
    SqlInjectionAttempt,
    DdosDetected,
    SuspiciousLoginPattern,
    PasswordLeakDetected,
    MultipleFailedAttempts,
    SuspiciousActivity,
}

impl ThreatType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BruteForceDetected => "brute_force_detected",
            Self::SqlInjectionAttempt => "sql_injection_attempt",
            Self::DdosDetected => "ddos_detected",
            Self::SuspiciousLoginPattern => "suspicious_login_pattern",
            Self::PasswordLeakDetected => "password_leak_detected",
            Self::MultipleFailedAttempts => "multiple_failed_attempts",
            Self::SuspiciousActivity => "suspicious_activity",
        }
    }

    /// Whether remediation targets a single named account (`details.user_id`).
    #[must_use]
    pub const fn targets_user(&self) -> bool {
        matches!(
            self,
            Self::SuspiciousLoginPattern
                | Self::PasswordLeakDetected
                | Self::MultipleFailedAttempts
                | Self::SuspiciousActivity
        )
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse summary of recent threat activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Excellent,
    Good,
    Moderate,
    Critical,
}

impl SecurityLevel {
    /// Maps a weighted threat score to a level.
    #[must_use]
    pub const fn from_score(score: i64) -> Self {
        if score <= 0 {
            Self::Excellent
        } else if score < 10 {
            Self::Good
        } else if score < 50 {
            Self::Moderate
        } else {
            Self::Critical
        }
    }

    /// Computes the level from per-severity counts.
    ///
    /// Levels that are not a known severity contribute nothing.
    pub fn from_counts<'a, I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let score = counts
            .into_iter()
            .filter_map(|(level, count)| {
                level
                    .parse::<Severity>()
                    .ok()
                    .map(|severity| severity.weight() * count)
            })
            .sum();
        Self::from_score(score)
    }
}
