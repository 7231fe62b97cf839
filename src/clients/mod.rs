//! Outbound identity-provider integrations.

pub mod telegram;
pub mod vk;
pub mod yandex;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AuthProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} login is not configured")]
    NotConfigured(AuthProvider),

    #[error("{provider} rejected the login: {reason}")]
    Rejected {
        provider: AuthProvider,
        reason: String,
    },

    #[error("Request to {provider} failed: {source}")]
    Transport {
        provider: AuthProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

impl ProviderError {
    pub(crate) fn rejected(provider: AuthProvider, reason: impl Into<String>) -> Self {
        Self::Rejected {
            provider,
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(provider: AuthProvider) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { provider, source }
    }
}

/// Access token obtained by exchanging an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub access_token: String,
    /// Provider-assigned user id, when returned alongside the token.
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// A verified identity asserted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: AuthProvider,
    pub provider_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Authorization-code OAuth provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn provider(&self) -> AuthProvider;

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<AccessGrant, ProviderError>;

    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<ExternalIdentity, ProviderError>;
}

/// Falls back to a placeholder when a provider returns no usable name.
pub(crate) fn display_name(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .map(|name| name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or("User")
        .to_string()
}
