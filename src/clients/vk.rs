use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{AccessGrant, ExternalIdentity, OAuthProvider, ProviderError, display_name};
use crate::config::VkConfig;
use crate::domain::AuthProvider;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user_id: Option<i64>,
    email: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    response: Vec<VkUser>,
}

#[derive(Deserialize)]
struct VkUser {
    first_name: Option<String>,
    last_name: Option<String>,
    photo_200: Option<String>,
}

#[derive(Clone)]
pub struct VkClient {
    client: Client,
    config: VkConfig,
}

impl VkClient {
    #[must_use]
    pub const fn new(client: Client, config: VkConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, base: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        Url::parse_with_params(base, params)
            .map_err(|e| ProviderError::rejected(AuthProvider::Vk, format!("invalid endpoint: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for VkClient {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Vk
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<AccessGrant, ProviderError> {
        if self.config.app_id.is_empty() || self.config.app_secret.is_empty() {
            return Err(ProviderError::NotConfigured(AuthProvider::Vk));
        }

        let url = self.url(
            &self.config.token_url,
            &[
                ("client_id", self.config.app_id.as_str()),
                ("client_secret", self.config.app_secret.as_str()),
                ("redirect_uri", redirect_uri.unwrap_or_default()),
                ("code", code),
            ],
        )?;

        let body: TokenResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::transport(AuthProvider::Vk))?
            .json()
            .await
            .map_err(ProviderError::transport(AuthProvider::Vk))?;

        if let Some(error) = body.error {
            return Err(ProviderError::rejected(
                AuthProvider::Vk,
                body.error_description.unwrap_or(error),
            ));
        }

        match (body.access_token, body.user_id) {
            (Some(access_token), Some(user_id)) => Ok(AccessGrant {
                access_token,
                user_id: Some(user_id.to_string()),
                email: body.email,
            }),
            _ => Err(ProviderError::rejected(
                AuthProvider::Vk,
                "token response is missing access_token or user_id",
            )),
        }
    }

    async fn fetch_profile(&self, grant: &AccessGrant) -> Result<ExternalIdentity, ProviderError> {
        let user_id = grant
            .user_id
            .as_deref()
            .ok_or_else(|| ProviderError::rejected(AuthProvider::Vk, "missing user id"))?;

        let endpoint = format!("{}/users.get", self.config.api_url.trim_end_matches('/'));
        let url = self.url(
            &endpoint,
            &[
                ("user_ids", user_id),
                ("fields", "photo_200"),
                ("access_token", grant.access_token.as_str()),
                ("v", self.config.api_version.as_str()),
            ],
        )?;

        let body: UsersResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::transport(AuthProvider::Vk))?
            .json()
            .await
            .map_err(ProviderError::transport(AuthProvider::Vk))?;

        let user = body
            .response
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::rejected(AuthProvider::Vk, "profile not found"))?;

        let full_name = format!(
            "{} {}",
            user.first_name.unwrap_or_default(),
            user.last_name.unwrap_or_default()
        );

        Ok(ExternalIdentity {
            provider: AuthProvider::Vk,
            provider_id: user_id.to_string(),
            username: display_name(&[Some(full_name.as_str())]),
            email: grant.email.clone(),
            avatar_url: user.photo_200,
        })
    }
}
