//! Domain service for credential authentication and account management.
//!
//! Handles login with lockout, registration, the password reset flow,
//! profile updates and session termination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ClientMeta;
use crate::models::user::UserProfile;
use crate::services::tokens::{Claims, TokenError};

/// Message returned by `forgot_password` whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is disabled")]
    AccountInactive,

    #[error("{0}")]
    Forbidden(String),

    #[error("Too many failed login attempts from this address, try again later")]
    RateLimited,

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::Unauthorized("Token expired".to_string()),
            TokenError::Invalid => Self::Unauthorized("Invalid token".to_string()),
            TokenError::Signing(msg) => Self::Internal(msg),
        }
    }
}

/// Tokens handed out after a successful login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub session_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Email/password login.
    ///
    /// Every call appends exactly one login attempt row.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] when the source IP is blocked or has too many recent failures
    /// - [`AuthError::InvalidCredentials`] for unknown email or wrong password
    /// - [`AuthError::AccountLocked`] / [`AuthError::AccountInactive`]
    async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError>;

    /// Creates a local account and logs it in.
    async fn register(
        &self,
        registration: Registration,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError>;

    /// Starts the reset flow. The outcome is indistinguishable for unknown emails.
    async fn forgot_password(&self, email: &str, client: &ClientMeta) -> Result<(), AuthError>;

    /// Redeems a reset token. Each token works once.
    async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> Result<(), AuthError>;

    /// Verifies an identity token without touching storage.
    fn verify_token(&self, token: &str) -> Result<Claims, AuthError>;

    /// Resolves an identity token to an active account.
    async fn authenticate(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Like [`AuthService::authenticate`], additionally requiring admin rights.
    async fn authenticate_admin(&self, token: &str) -> Result<UserProfile, AuthError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AuthError>;

    /// Changes the password of a local account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if current password is incorrect or new password invalid.
    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> Result<(), AuthError>;

    /// Ends the session identified by its raw token. Unknown or already
    /// expired tokens are accepted silently.
    async fn logout(&self, session_token: &str, client: &ClientMeta) -> Result<(), AuthError>;

    /// Ends every session of the user and returns how many were live.
    async fn logout_all(&self, user_id: &str, client: &ClientMeta) -> Result<u64, AuthError>;
}

/// Trims and lowercases an email for lookups and storage.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
