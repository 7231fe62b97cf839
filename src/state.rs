use std::sync::Arc;

use crate::clients::OAuthProvider;
use crate::clients::telegram::TelegramWidget;
use crate::clients::vk::VkClient;
use crate::clients::yandex::YandexClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, FederatedIdentityService, LogMailer, Mailer, SeaOrmAuthService,
    SeaOrmThreatService, SmtpMailer, ThreatService, TokenService,
};

const HTTP_TIMEOUT_SECONDS: u64 = 15;

/// Build a shared HTTP client for the identity providers.
/// Reused across providers for connection pooling.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("aniguard/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    if config.mail.enabled {
        Ok(Arc::new(SmtpMailer::new(&config.mail)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

/// Outbound integrations, swappable so tests can stand in fakes.
pub struct Integrations {
    pub mailer: Arc<dyn Mailer>,
    pub yandex: Arc<dyn OAuthProvider>,
    pub vk: Arc<dyn OAuthProvider>,
}

impl Integrations {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(HTTP_TIMEOUT_SECONDS)?;

        Ok(Self {
            mailer: build_mailer(config)?,
            yandex: Arc::new(YandexClient::new(
                http_client.clone(),
                config.oauth.yandex.clone(),
            )),
            vk: Arc::new(VkClient::new(http_client, config.oauth.vk.clone())),
        })
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub federated: Arc<FederatedIdentityService>,

    pub threats: Arc<dyn ThreatService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let integrations = Integrations::from_config(&config)?;
        Self::with_integrations(config, integrations).await
    }

    pub async fn with_integrations(
        config: Config,
        integrations: Integrations,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let tokens = Arc::new(TokenService::new(&config.tokens)?);

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            integrations.mailer.clone(),
            &config,
        )) as Arc<dyn AuthService>;

        let federated = Arc::new(FederatedIdentityService::new(
            store.clone(),
            tokens,
            integrations.yandex,
            integrations.vk,
            TelegramWidget::new(&config.oauth.telegram),
        ));

        let threats = Arc::new(SeaOrmThreatService::new(
            store.clone(),
            integrations.mailer,
            &config,
        )) as Arc<dyn ThreatService>;

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            federated,
            threats,
        })
    }
}
