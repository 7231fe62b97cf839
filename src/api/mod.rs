use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, FederatedIdentityService, ThreatService};
use crate::state::{Integrations, SharedState};

pub mod auth;
pub mod client;
mod error;
mod oauth;
mod observability;
mod security;
mod system;
mod types;
mod validation;

pub use auth::AUTH_TOKEN_HEADER;
pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub federated: Arc<FederatedIdentityService>,

    pub threats: Arc<dyn ThreatService>,

    pub trusted_proxies: Vec<IpAddr>,

    pub start_time: Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let trusted_proxies = client::parse_trusted_proxies(&shared.config.server.trusted_proxy_ips);

    Arc::new(AppState {
        store: shared.store.clone(),
        auth: shared.auth.clone(),
        federated: shared.federated.clone(),
        threats: shared.threats.clone(),
        shared,
        trusted_proxies,
        start_time: Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

/// Builds state around caller-supplied integrations instead of the live ones.
pub async fn create_app_state_with_integrations(
    config: Config,
    integrations: Integrations,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_integrations(config, integrations).await?);
    Ok(create_app_state(shared, None))
}

pub fn router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/auth", get(auth::get_auth).post(auth::post_auth))
        .route("/auth/oauth", post(oauth::oauth_login))
        .route(
            "/auto-security",
            get(security::get_status).post(security::report_threat),
        )
        .route("/health", get(system::health));

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_router)
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_metrics))
}
