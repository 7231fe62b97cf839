//! `/api/auto-security`: threat intake and status, admin only.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;

use super::auth::require_token;
use super::client::Client;
use super::{ApiError, ApiResponse, AppState};
use crate::models::user::UserProfile;
use crate::services::{SecurityStatus, ThreatResponse, ThreatSignal};

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<UserProfile, ApiError> {
    let token = require_token(headers)?;
    Ok(state.auth.authenticate_admin(&token).await?)
}

/// GET /api/auto-security
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SecurityStatus>>, ApiError> {
    require_admin(&state, &headers).await?;
    let status = state.threats.status().await?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /api/auto-security
pub async fn report_threat(
    State(state): State<Arc<AppState>>,
    Client(client): Client,
    headers: HeaderMap,
    payload: Result<Json<ThreatSignal>, JsonRejection>,
) -> Result<Json<ApiResponse<ThreatResponse>>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let Json(signal) = payload?;

    tracing::info!(
        admin_id = %admin.id,
        threat_type = %signal.threat_type,
        threat_level = %signal.threat_level,
        "Threat signal received"
    );

    let response = state.threats.respond(signal, &client).await?;
    Ok(Json(ApiResponse::success(response)))
}
