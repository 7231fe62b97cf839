//! `/api/auth/oauth`: federated login.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use super::client::Client;
use super::{ApiError, ApiResponse, AppState};
use crate::services::{AuthSession, ProviderLogin};

/// POST /api/auth/oauth
pub async fn oauth_login(
    State(state): State<Arc<AppState>>,
    Client(client): Client,
    payload: Result<Json<ProviderLogin>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthSession>>, ApiError> {
    let Json(request) = payload?;
    let provider = request.provider();

    let session = state.federated.login(request, &client).await?;
    tracing::info!(
        provider = %provider,
        user_id = %session.user.id,
        ip = %client.ip,
        "Federated login succeeded"
    );

    Ok(Json(ApiResponse::success(session)))
}
