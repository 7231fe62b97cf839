#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use aniguard::api::{self, AUTH_TOKEN_HEADER, AppState};
use aniguard::clients::{AccessGrant, ExternalIdentity, OAuthProvider, ProviderError};
use aniguard::config::Config;
use aniguard::domain::AuthProvider;
use aniguard::services::{MailMessage, Mailer};
use aniguard::state::Integrations;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-signing-secret-0123456789";
pub const TEST_PASSWORD: &str = "correct horse battery";
pub const CLIENT_IP: [u8; 4] = [203, 0, 113, 10];

#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
}

impl CapturingMailer {
    pub fn messages(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Provider stand-in that accepts one code and returns a fixed identity.
pub struct StaticProvider {
    pub provider: AuthProvider,
    pub code: &'static str,
    pub identity: ExternalIdentity,
}

#[async_trait]
impl OAuthProvider for StaticProvider {
    fn provider(&self) -> AuthProvider {
        self.provider
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: Option<&str>,
    ) -> Result<AccessGrant, ProviderError> {
        if code != self.code {
            return Err(ProviderError::Rejected {
                provider: self.provider,
                reason: "invalid_grant".to_string(),
            });
        }
        Ok(AccessGrant {
            access_token: "access".to_string(),
            user_id: None,
            email: None,
        })
    }

    async fn fetch_profile(&self, _grant: &AccessGrant) -> Result<ExternalIdentity, ProviderError> {
        Ok(self.identity.clone())
    }
}

pub fn static_provider(provider: AuthProvider, provider_id: &str, email: Option<&str>) -> StaticProvider {
    StaticProvider {
        provider,
        code: "good-code",
        identity: ExternalIdentity {
            provider,
            provider_id: provider_id.to_string(),
            username: format!("{provider} user"),
            email: email.map(str::to_string),
            avatar_url: None,
        },
    }
}

fn temp_database() -> (String, PathBuf) {
    let path = std::env::temp_dir().join(format!("aniguard-test-{}.db", uuid::Uuid::new_v4()));
    (format!("sqlite:{}", path.display()), path)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tokens.secret = TEST_SECRET.to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.oauth.telegram.bot_token = "123456:TEST-BOT-TOKEN".to_string();
    config.mail.site_url = "https://anime.example".to_string();
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<CapturingMailer>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub struct TestAppBuilder {
    config: Config,
    yandex: Arc<dyn OAuthProvider>,
    vk: Arc<dyn OAuthProvider>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            yandex: Arc::new(static_provider(AuthProvider::Yandex, "ya-1", None)),
            vk: Arc::new(static_provider(AuthProvider::Vk, "1001", None)),
        }
    }

    pub fn config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn yandex(mut self, provider: impl OAuthProvider + 'static) -> Self {
        self.yandex = Arc::new(provider);
        self
    }

    pub fn vk(mut self, provider: impl OAuthProvider + 'static) -> Self {
        self.vk = Arc::new(provider);
        self
    }

    pub async fn build(self) -> TestApp {
        let (url, db_path) = temp_database();
        let mut config = self.config;
        config.general.database_url = url;

        let mailer = Arc::new(CapturingMailer::default());
        let integrations = Integrations {
            mailer: mailer.clone(),
            yandex: self.yandex,
            vk: self.vk,
        };

        let state = api::create_app_state_with_integrations(config, integrations)
            .await
            .expect("Failed to create app state");

        TestApp {
            router: api::router(state.clone()),
            state,
            mailer,
            db_path,
        }
    }
}

pub async fn spawn_app() -> TestApp {
    TestAppBuilder::new().build().await
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let peer = SocketAddr::from((CLIENT_IP, 40_000));
        self.request_from(Some(peer), method, uri, token, body).await
    }

    /// Sends a request as a caller at `peer`, or with no connection info at all.
    pub async fn request_from(
        &self,
        peer: Option<SocketAddr>,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTH_TOKEN_HEADER, token);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let mut request = builder.body(body).unwrap();
        if let Some(peer) = peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post_auth(&self, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", "/api/auth", token, Some(body)).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Value {
        let (status, body) = self
            .post_auth(
                None,
                serde_json::json!({
                    "action": "register",
                    "email": email,
                    "password": password,
                    "username": "Tester",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["data"].clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post_auth(
            None,
            serde_json::json!({ "action": "login", "email": email, "password": password }),
        )
        .await
    }

    /// Registers an account, grants it admin rights and returns a fresh token.
    pub async fn admin_token(&self) -> String {
        self.register("admin@example.com", TEST_PASSWORD).await;
        assert!(self.state.store.set_admin("admin@example.com", true).await.unwrap());
        let (status, body) = self.login("admin@example.com", TEST_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }
}
