//! Federated login: provider exchange, then get-or-create of the local account.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::clients::telegram::{TelegramWidget, WidgetPayload};
use crate::clients::{ExternalIdentity, OAuthProvider, ProviderError};
use crate::db::{NewUser, Store};
use crate::domain::{AuthProvider, ClientMeta, Severity};
use crate::entities::users;
use crate::models::user::UserProfile;
use crate::services::audit;
use crate::services::auth_service::{AuthSession, normalize_email};
use crate::services::tokens::TokenService;

#[derive(Debug, Error)]
pub enum FederatedError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Conflict(String),

    #[error("Account is locked until {until}")]
    AccountLocked { until: chrono::DateTime<Utc> },

    #[error("Account is disabled")]
    AccountInactive,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for FederatedError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for FederatedError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Federated login request, tagged by provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderLogin {
    Yandex {
        code: String,
    },
    Telegram {
        telegram_data: WidgetPayload,
    },
    Vk {
        code: String,
        redirect_uri: String,
    },
}

impl ProviderLogin {
    #[must_use]
    pub const fn provider(&self) -> AuthProvider {
        match self {
            Self::Yandex { .. } => AuthProvider::Yandex,
            Self::Telegram { .. } => AuthProvider::Telegram,
            Self::Vk { .. } => AuthProvider::Vk,
        }
    }
}

/// Local user id for a federated identity: the first 32 hex digits of
/// `SHA256("provider:provider_id")`.
#[must_use]
pub fn derive_user_id(provider: AuthProvider, provider_id: &str) -> String {
    let digest = Sha256::digest(format!("{provider}:{provider_id}").as_bytes());
    hex::encode(&digest[..16])
}

pub struct FederatedIdentityService {
    store: Store,
    tokens: Arc<TokenService>,
    yandex: Arc<dyn OAuthProvider>,
    vk: Arc<dyn OAuthProvider>,
    telegram: TelegramWidget,
}

impl FederatedIdentityService {
    #[must_use]
    pub fn new(
        store: Store,
        tokens: Arc<TokenService>,
        yandex: Arc<dyn OAuthProvider>,
        vk: Arc<dyn OAuthProvider>,
        telegram: TelegramWidget,
    ) -> Self {
        Self {
            store,
            tokens,
            yandex,
            vk,
            telegram,
        }
    }

    pub async fn login(
        &self,
        request: ProviderLogin,
        client: &ClientMeta,
    ) -> Result<AuthSession, FederatedError> {
        let provider = request.provider();
        let identity = match request {
            ProviderLogin::Yandex { code } => {
                Self::code_flow(self.yandex.as_ref(), &code, None).await?
            }
            ProviderLogin::Vk { code, redirect_uri } => {
                if redirect_uri.trim().is_empty() {
                    return Err(FederatedError::Validation(
                        "redirect_uri is required".to_string(),
                    ));
                }
                Self::code_flow(self.vk.as_ref(), &code, Some(&redirect_uri)).await?
            }
            ProviderLogin::Telegram { telegram_data } => {
                match self.telegram.verify_widget_signature(&telegram_data) {
                    Ok(identity) => identity,
                    Err(ProviderError::InvalidSignature(reason)) => {
                        audit::security_event(
                            &self.store,
                            None,
                            "invalid_telegram_signature",
                            client,
                            Severity::Critical,
                            json!({ "reason": reason }),
                        )
                        .await?;
                        return Err(ProviderError::InvalidSignature(reason).into());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let mut user = self.get_or_create_user(&identity).await?;

        if !user.is_active {
            return Err(FederatedError::AccountInactive);
        }
        if let Some(until) = user.locked_until.filter(|until| *until > Utc::now()) {
            return Err(FederatedError::AccountLocked { until });
        }

        self.store.touch_last_login(&user.id).await?;
        user.last_login = Some(Utc::now());

        let token = self
            .tokens
            .issue(&user.id, user.email.as_deref(), user.is_admin)
            .map_err(|e| FederatedError::Internal(e.to_string()))?;
        let session_token = self
            .tokens
            .issue_session(&self.store, &user.id, client)
            .await?;

        audit::security_event(
            &self.store,
            Some(&user.id),
            "oauth_login",
            client,
            Severity::Low,
            json!({ "provider": provider }),
        )
        .await?;
        counter!("auth_federated_logins_total", "provider" => provider.as_str()).increment(1);

        Ok(AuthSession {
            token,
            session_token,
            user: UserProfile::from(user),
        })
    }

    async fn code_flow(
        provider: &dyn OAuthProvider,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<ExternalIdentity, FederatedError> {
        if code.trim().is_empty() {
            return Err(FederatedError::Validation(
                "Authorization code is required".to_string(),
            ));
        }

        let grant = provider.exchange_code(code, redirect_uri).await?;
        Ok(provider.fetch_profile(&grant).await?)
    }

    /// Maps a verified identity to its local account, creating it on first login.
    pub async fn get_or_create_user(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<users::Model, FederatedError> {
        if let Some(user) = self
            .store
            .get_user_by_provider(identity.provider, &identity.provider_id)
            .await?
        {
            return Ok(user);
        }

        let email = identity
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty());

        if let Some(email) = email.as_deref()
            && self.store.get_user_by_email(email).await?.is_some()
        {
            return Err(FederatedError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let created = self
            .store
            .create_user(NewUser {
                id: derive_user_id(identity.provider, &identity.provider_id),
                email,
                password_hash: None,
                username: identity.username.clone(),
                avatar_url: identity.avatar_url.clone(),
                provider: identity.provider,
                provider_id: identity.provider_id.clone(),
            })
            .await?;
        if let Some(user) = created {
            return Ok(user);
        }

        // A concurrent first login may have inserted the row already
        self.store
            .get_user_by_provider(identity.provider, &identity.provider_id)
            .await?
            .ok_or_else(|| {
                FederatedError::Conflict("An account with this email already exists".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_and_provider_scoped() {
        let a = derive_user_id(AuthProvider::Vk, "1");
        assert_eq!(a, derive_user_id(AuthProvider::Vk, "1"));
        assert_eq!(a.len(), 32);
        assert_ne!(a, derive_user_id(AuthProvider::Telegram, "1"));
        assert_ne!(a, derive_user_id(AuthProvider::Vk, "2"));
    }

    #[test]
    fn login_request_is_tagged_by_provider() {
        let request: ProviderLogin =
            serde_json::from_str(r#"{"provider":"vk","code":"c","redirect_uri":"https://x"}"#)
                .unwrap();
        assert_eq!(request.provider(), AuthProvider::Vk);

        let request: ProviderLogin = serde_json::from_str(
            r#"{"provider":"telegram","telegram_data":{"id":1,"hash":"ab"}}"#,
        )
        .unwrap();
        assert_eq!(request.provider(), AuthProvider::Telegram);

        assert!(serde_json::from_str::<ProviderLogin>(r#"{"provider":"github"}"#).is_err());
    }
}
