//! `/api/auth`: token checks and account commands.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::client::Client;
use super::validation::{
    require, validate_avatar_url, validate_bio, validate_email, validate_username,
};
use super::{ApiError, ApiResponse, AppState, LogoutAllResponse, MessageResponse, TokenCheck};
use crate::models::user::UserProfile;
use crate::services::auth_service::RESET_REQUESTED_MESSAGE;
use crate::services::{AuthSession, ProfileUpdate, Registration};

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryAction {
    Verify,
    Me,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub action: QueryAction,
}

/// Commands accepted by `POST /api/auth`, tagged by `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuthCommand {
    Login {
        email: String,
        password: String,
    },
    Register {
        email: String,
        password: String,
        username: String,
    },
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        token: String,
        #[serde(alias = "new_password")]
        password: String,
    },
    Logout {
        session_token: String,
    },
    LogoutAll,
    UpdateProfile {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        bio: Option<String>,
        #[serde(default)]
        avatar_url: Option<String>,
    },
    ChangePassword {
        current_password: String,
        new_password: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AuthReply {
    Session(AuthSession),
    Profile(UserProfile),
    Message(MessageResponse),
    LoggedOut(LogoutAllResponse),
}

/// Identity token from `X-Auth-Token`, falling back to `Authorization: Bearer`.
pub(crate) fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTH_TOKEN_HEADER)
        && let Ok(token) = value.to_str()
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

pub(crate) fn require_token(headers: &HeaderMap) -> Result<String, ApiError> {
    extract_token(headers).ok_or_else(|| ApiError::unauthorized("Token required"))
}

/// GET /api/auth?action=verify|me
pub async fn get_auth(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AuthQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let Query(query) = query?;
    let token = require_token(&headers)?;

    let data = match query.action {
        QueryAction::Verify => {
            let claims = state.auth.verify_token(&token)?;
            serde_json::to_value(TokenCheck {
                valid: true,
                user_id: claims.user_id,
                email: claims.email,
                is_admin: claims.is_admin,
                expires_at: claims.exp,
            })
        }
        QueryAction::Me => serde_json::to_value(state.auth.authenticate(&token).await?),
    }
    .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(ApiResponse::success(data)))
}

/// POST /api/auth
pub async fn post_auth(
    State(state): State<Arc<AppState>>,
    Client(client): Client,
    headers: HeaderMap,
    payload: Result<Json<AuthCommand>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthReply>>, ApiError> {
    let Json(command) = payload?;
    let auth = &state.auth;

    let reply = match command {
        AuthCommand::Login { email, password } => {
            let email = require(&email, "Email")?;
            if password.is_empty() {
                return Err(ApiError::validation("Password is required"));
            }
            AuthReply::Session(auth.login(email, &password, &client).await?)
        }

        AuthCommand::Register {
            email,
            password,
            username,
        } => {
            let registration = Registration {
                email: validate_email(&email)?.to_string(),
                username: validate_username(&username)?.to_string(),
                password,
            };
            AuthReply::Session(auth.register(registration, &client).await?)
        }

        AuthCommand::ForgotPassword { email } => {
            let email = require(&email, "Email")?;
            auth.forgot_password(email, &client).await?;
            AuthReply::Message(MessageResponse::new(RESET_REQUESTED_MESSAGE))
        }

        AuthCommand::ResetPassword { token, password } => {
            let token = require(&token, "Token")?;
            auth.reset_password(token, &password, &client).await?;
            AuthReply::Message(MessageResponse::new("Password has been reset"))
        }

        AuthCommand::Logout { session_token } => {
            let session_token = require(&session_token, "Session token")?;
            auth.logout(session_token, &client).await?;
            AuthReply::Message(MessageResponse::new("Logged out"))
        }

        AuthCommand::LogoutAll => {
            let user = auth.authenticate(&require_token(&headers)?).await?;
            let sessions_ended = auth.logout_all(&user.id, &client).await?;
            AuthReply::LoggedOut(LogoutAllResponse {
                message: "All sessions have been ended".to_string(),
                sessions_ended,
            })
        }

        AuthCommand::UpdateProfile {
            username,
            bio,
            avatar_url,
        } => {
            let user = auth.authenticate(&require_token(&headers)?).await?;
            let update = ProfileUpdate {
                username: username
                    .as_deref()
                    .map(validate_username)
                    .transpose()?
                    .map(str::to_string),
                bio: bio.as_deref().map(validate_bio).transpose()?.map(str::to_string),
                avatar_url: avatar_url
                    .as_deref()
                    .map(validate_avatar_url)
                    .transpose()?
                    .map(str::to_string),
            };
            AuthReply::Profile(auth.update_profile(&user.id, update).await?)
        }

        AuthCommand::ChangePassword {
            current_password,
            new_password,
        } => {
            let user = auth.authenticate(&require_token(&headers)?).await?;
            if current_password.is_empty() {
                return Err(ApiError::validation("Current password is required"));
            }
            auth.change_password(&user.id, &current_password, &new_password, &client)
                .await?;
            AuthReply::Message(MessageResponse::new("Password changed"))
        }
    };

    Ok(Json(ApiResponse::success(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn commands_are_tagged_by_action() {
        let cmd: AuthCommand =
            serde_json::from_str(r#"{"action":"login","email":"a@b.c","password":"x"}"#).unwrap();
        assert!(matches!(cmd, AuthCommand::Login { .. }));

        let cmd: AuthCommand =
            serde_json::from_str(r#"{"action":"reset_password","token":"t","new_password":"p"}"#)
                .unwrap();
        assert!(matches!(cmd, AuthCommand::ResetPassword { password, .. } if password == "p"));

        let cmd: AuthCommand = serde_json::from_str(r#"{"action":"logout_all"}"#).unwrap();
        assert!(matches!(cmd, AuthCommand::LogoutAll));

        assert!(serde_json::from_str::<AuthCommand>(r#"{"action":"drop_tables"}"#).is_err());
        assert!(serde_json::from_str::<AuthCommand>(r#"{"action":"login","email":"a"}"#).is_err());
    }

    #[test]
    fn token_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        headers.insert("Authorization", HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-bearer"));

        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }
}
