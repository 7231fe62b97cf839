//! Identity tokens (HS256 JWT) and opaque session tokens.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{MIN_SECRET_LEN, TokenConfig};
use crate::db::Store;
use crate::domain::ClientMeta;

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub is_admin: bool,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    identity_ttl: Duration,
    session_ttl: Duration,
}

impl TokenService {
    /// Builds the service from configuration. Refuses short or missing secrets.
    pub fn new(config: &TokenConfig) -> Result<Self> {
        if config.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("Token signing secret must be at least {MIN_SECRET_LEN} bytes");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            identity_ttl: Duration::days(config.identity_ttl_days),
            session_ttl: Duration::days(config.session_ttl_days),
        })
    }

    pub fn issue(
        &self,
        user_id: &str,
        email: Option<&str>,
        is_admin: bool,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
            is_admin,
            exp: (Utc::now() + self.identity_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Checks signature and expiry. Has no side effects.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Creates a session for `user_id` and returns the raw token.
    ///
    /// Only the SHA-256 of the token is persisted.
    pub async fn issue_session(
        &self,
        store: &Store,
        user_id: &str,
        client: &ClientMeta,
    ) -> Result<String> {
        let raw = generate_opaque_token();
        let expires_at = Utc::now() + self.session_ttl;
        store
            .create_session(user_id, hash_token(&raw), client, expires_at)
            .await?;
        Ok(raw)
    }
}

/// 32 random bytes, URL-safe base64 without padding.
#[must_use]
pub fn generate_opaque_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of an opaque token, as stored in the database.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
