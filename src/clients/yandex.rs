use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use super::{AccessGrant, ExternalIdentity, OAuthProvider, ProviderError, display_name};
use crate::config::YandexConfig;
use crate::domain::AuthProvider;

const AVATAR_URL: &str = "https://avatars.yandex.net/get-yapic";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    id: String,
    login: Option<String>,
    display_name: Option<String>,
    default_email: Option<String>,
    default_avatar_id: Option<String>,
    #[serde(default)]
    is_avatar_empty: bool,
}

#[derive(Clone)]
pub struct YandexClient {
    client: Client,
    config: YandexConfig,
}

impl YandexClient {
    #[must_use]
    pub const fn new(client: Client, config: YandexConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl OAuthProvider for YandexClient {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Yandex
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: Option<&str>,
    ) -> Result<AccessGrant, ProviderError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ProviderError::NotConfigured(AuthProvider::Yandex));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(ProviderError::transport(AuthProvider::Yandex))?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(ProviderError::transport(AuthProvider::Yandex))?;

        match body.access_token {
            Some(access_token) if status.is_success() => Ok(AccessGrant {
                access_token,
                user_id: None,
                email: None,
            }),
            _ => {
                let reason = body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| format!("token endpoint returned {status}"));
                Err(ProviderError::rejected(AuthProvider::Yandex, reason))
            }
        }
    }

    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<ExternalIdentity, ProviderError> {
        let response = self
            .client
            .get(&self.config.info_url)
            .header(AUTHORIZATION, format!("OAuth {}", grant.access_token))
            .send()
            .await
            .map_err(ProviderError::transport(AuthProvider::Yandex))?;

        if !response.status().is_success() {
            return Err(ProviderError::rejected(
                AuthProvider::Yandex,
                format!("profile endpoint returned {}", response.status()),
            ));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(ProviderError::transport(AuthProvider::Yandex))?;

        let avatar_url = info
            .default_avatar_id
            .filter(|id| !id.is_empty() && !info.is_avatar_empty)
            .map(|id| format!("{AVATAR_URL}/{id}/islands-200"));

        Ok(ExternalIdentity {
            provider: AuthProvider::Yandex,
            username: display_name(&[info.display_name.as_deref(), info.login.as_deref()]),
            provider_id: info.id,
            email: info.default_email.filter(|email| !email.is_empty()),
            avatar_url,
        })
    }
}
