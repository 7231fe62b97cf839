//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::counter;
use serde_json::json;
use uuid::Uuid;

use crate::config::{Config, SecurityConfig};
use crate::db::{NewUser, ProfileChanges, Store};
use crate::domain::{AuthProvider, ClientMeta, Severity};
use crate::entities::users;
use crate::models::user::UserProfile;
use crate::services::audit;
use crate::services::auth_service::{
    AuthError, AuthService, AuthSession, ProfileUpdate, Registration, normalize_email,
};
use crate::services::mailer::{self, MailMessage, Mailer};
use crate::services::password::{hash_password, verify_password};
use crate::services::tokens::{Claims, TokenService, generate_opaque_token, hash_token};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    security: SecurityConfig,
    reset_ttl: Duration,
    site_url: String,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            security: config.security.clone(),
            reset_ttl: Duration::minutes(config.tokens.reset_ttl_minutes),
            site_url: config.mail.site_url.clone(),
        }
    }

    async fn audit(
        &self,
        user_id: Option<&str>,
        event: &str,
        client: &ClientMeta,
        severity: Severity,
        details: serde_json::Value,
    ) -> Result<(), AuthError> {
        audit::security_event(&self.store, user_id, event, client, severity, details).await?;
        Ok(())
    }

    async fn start_session(
        &self,
        user: users::Model,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        let token = self
            .tokens
            .issue(&user.id, user.email.as_deref(), user.is_admin)?;
        let session_token = self
            .tokens
            .issue_session(&self.store, &user.id, client)
            .await?;

        Ok(AuthSession {
            token,
            session_token,
            user: UserProfile::from(user),
        })
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AuthError> {
        let min = self.security.password_min_length;
        if password.chars().count() < min {
            return Err(AuthError::Validation(format!(
                "Password must be at least {min} characters"
            )));
        }
        Ok(())
    }

    async fn reject_duplicate(
        &self,
        email: &str,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        self.audit(
            None,
            "duplicate_registration",
            client,
            Severity::Medium,
            json!({ "email": email }),
        )
        .await?;
        Err(AuthError::Conflict(
            "User with this email already exists".to_string(),
        ))
    }

    async fn reject_login(
        &self,
        email: &str,
        client: &ClientMeta,
        reason: &'static str,
        error: AuthError,
    ) -> Result<AuthSession, AuthError> {
        self.store
            .record_login_attempt(Some(email), client, Some(reason))
            .await?;
        counter!("auth_login_attempts_total", "outcome" => reason).increment(1);
        Err(error)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let lockout = &self.security.lockout;
        let now = Utc::now();

        // IP reputation first; no password check for a throttled source.
        // Callers without a resolved address share no bucket.
        let (recent_failures, ip_blocked) = if client.has_known_ip() {
            let recent_failures = self
                .store
                .count_failed_from_ip(
                    &client.ip,
                    now - Duration::minutes(lockout.ip_window_minutes),
                )
                .await?;
            let ip_blocked = self
                .store
                .is_ip_blocked(&client.ip, now - Duration::hours(lockout.ip_block_hours))
                .await?;
            (recent_failures, ip_blocked)
        } else {
            (0, false)
        };

        if ip_blocked || recent_failures >= lockout.ip_failure_threshold {
            self.audit(
                None,
                "blocked_ip_attempt",
                client,
                Severity::High,
                json!({ "email": email, "recent_failures": recent_failures, "ip_blocked": ip_blocked }),
            )
            .await?;
            return self
                .reject_login(&email, client, "rate_limited", AuthError::RateLimited)
                .await;
        }

        let user = match self.store.get_user_by_email(&email).await? {
            Some(user) if user.provider == AuthProvider::Email.as_str() => user,
            _ => {
                return self
                    .reject_login(&email, client, "user_not_found", AuthError::InvalidCredentials)
                    .await;
            }
        };

        if let Some(until) = user.locked_until.filter(|until| *until > now) {
            return self
                .reject_login(&email, client, "account_locked", AuthError::AccountLocked { until })
                .await;
        }

        if !user.is_active {
            return self
                .reject_login(&email, client, "account_inactive", AuthError::AccountInactive)
                .await;
        }

        let password_ok = match user.password_hash.as_deref() {
            Some(hash) => verify_password(password, hash).await?,
            None => false,
        };

        if !password_ok {
            let failed = self
                .store
                .record_failed_login(
                    &user.id,
                    lockout.max_failed_attempts,
                    Duration::minutes(lockout.lock_minutes),
                )
                .await?;

            if let Some(until) = failed.locked_until {
                counter!("auth_lockouts_total").increment(1);
                self.audit(
                    Some(&user.id),
                    "account_locked",
                    client,
                    Severity::Critical,
                    json!({ "failed_attempts": failed.attempts, "locked_until": until }),
                )
                .await?;
            }

            return self
                .reject_login(&email, client, "invalid_password", AuthError::InvalidCredentials)
                .await;
        }

        self.store.record_successful_login(&user.id).await?;
        self.store
            .record_login_attempt(Some(&email), client, None)
            .await?;
        counter!("auth_login_attempts_total", "outcome" => "success").increment(1);
        self.audit(
            Some(&user.id),
            "login_success",
            client,
            Severity::Low,
            json!({ "method": "password" }),
        )
        .await?;

        let user = self
            .store
            .get_user(&user.id)
            .await?
            .ok_or_else(|| AuthError::Internal("User vanished during login".to_string()))?;
        self.start_session(user, client).await
    }

    async fn register(
        &self,
        registration: Registration,
        client: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&registration.email);
        let username = registration.username.trim().to_string();
        self.check_password_policy(&registration.password)?;

        if self.store.get_user_by_email(&email).await?.is_some() {
            return self.reject_duplicate(&email, client).await;
        }

        let password_hash = hash_password(&registration.password, &self.security).await?;
        let created = self
            .store
            .create_user(NewUser {
                id: Uuid::new_v4().simple().to_string(),
                email: Some(email.clone()),
                password_hash: Some(password_hash),
                username,
                avatar_url: None,
                provider: AuthProvider::Email,
                provider_id: email.clone(),
            })
            .await?;

        // Lost a race against a concurrent registration of the same email
        let Some(user) = created else {
            return self.reject_duplicate(&email, client).await;
        };

        self.audit(
            Some(&user.id),
            "user_registered",
            client,
            Severity::Low,
            json!({ "provider": AuthProvider::Email }),
        )
        .await?;

        self.start_session(user, client).await
    }

    async fn forgot_password(&self, email: &str, client: &ClientMeta) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let user = self
            .store
            .get_user_by_email(&email)
            .await?
            .filter(|user| user.is_active && user.provider == AuthProvider::Email.as_str());

        let Some(user) = user else {
            return Ok(());
        };

        let raw = generate_opaque_token();
        self.store
            .create_reset_token(&user.id, hash_token(&raw), Utc::now() + self.reset_ttl)
            .await?;
        self.audit(
            Some(&user.id),
            "password_reset_requested",
            client,
            Severity::Low,
            json!({}),
        )
        .await?;

        mailer::deliver(
            self.mailer.as_ref(),
            MailMessage::password_reset(&email, &self.site_url, &raw),
        )
        .await;

        Ok(())
    }

    async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Validation("Reset token is required".to_string()));
        }
        self.check_password_policy(new_password)?;

        let password_hash = hash_password(new_password, &self.security).await?;
        let redeemed = self
            .store
            .redeem_reset_token(&hash_token(token), password_hash)
            .await?;

        match redeemed {
            Some(user_id) => {
                self.audit(
                    Some(&user_id),
                    "password_reset",
                    client,
                    Severity::Medium,
                    json!({}),
                )
                .await
            }
            None => {
                self.audit(
                    None,
                    "invalid_reset_token",
                    client,
                    Severity::Medium,
                    json!({}),
                )
                .await?;
                Err(AuthError::Validation(
                    "Invalid or expired reset token".to_string(),
                ))
            }
        }
    }

    fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.tokens.verify(token)?)
    }

    async fn authenticate(&self, token: &str) -> Result<UserProfile, AuthError> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .store
            .get_user(&claims.user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid token".to_string()))?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(user.into())
    }

    async fn authenticate_admin(&self, token: &str) -> Result<UserProfile, AuthError> {
        let claims = self.tokens.verify(token)?;
        if !claims.is_admin {
            return Err(AuthError::Forbidden("Admin access required".to_string()));
        }

        let profile = self.authenticate(token).await?;
        if !profile.is_admin {
            return Err(AuthError::Forbidden("Admin access required".to_string()));
        }

        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AuthError> {
        let changes = ProfileChanges {
            username: update.username.map(|name| name.trim().to_string()),
            bio: update.bio,
            avatar_url: update.avatar_url,
        };

        self.store
            .update_profile(user_id, changes)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AuthError::Unauthorized("Invalid token".to_string()))
    }

    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> Result<(), AuthError> {
        self.check_password_policy(new_password)?;

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid token".to_string()))?;

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::Validation(
                "This account does not use a password".to_string(),
            ));
        };

        if !verify_password(current_password, hash).await? {
            self.audit(
                Some(user_id),
                "password_change_failed",
                client,
                Severity::Medium,
                json!({}),
            )
            .await?;
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = hash_password(new_password, &self.security).await?;
        self.store.set_password(user_id, new_hash).await?;
        self.audit(
            Some(user_id),
            "password_changed",
            client,
            Severity::Low,
            json!({}),
        )
        .await
    }

    async fn logout(&self, session_token: &str, client: &ClientMeta) -> Result<(), AuthError> {
        if session_token.trim().is_empty() {
            return Err(AuthError::Validation("Session token is required".to_string()));
        }

        let token_hash = hash_token(session_token);
        let Some(session) = self.store.find_active_session(&token_hash).await? else {
            return Ok(());
        };

        self.store.expire_session(&token_hash).await?;
        self.audit(
            Some(&session.user_id),
            "logout",
            client,
            Severity::Low,
            json!({ "session_id": session.id }),
        )
        .await
    }

    async fn logout_all(&self, user_id: &str, client: &ClientMeta) -> Result<u64, AuthError> {
        let ended = self.store.expire_user_sessions(user_id).await?;
        self.audit(
            Some(user_id),
            "logout_all",
            client,
            Severity::Low,
            json!({ "sessions_ended": ended }),
        )
        .await?;
        Ok(ended)
    }
}
