use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use crate::domain::AuthProvider;
use crate::entities::{prelude::*, users};

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    pub provider_id: String,
}

/// Result of recording one failed password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedLogin {
    pub attempts: i32,
    /// Set only when this failure is the one that locked the account.
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    /// Looks up by email regardless of provider. `email` must already be normalized.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    pub async fn get_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<users::Model>> {
        Users::find()
            .filter(users::Column::Provider.eq(provider.as_str()))
            .filter(users::Column::ProviderId.eq(provider_id))
            .one(&self.conn)
            .await
            .context("Failed to query user by provider identity")
    }

    /// Inserts a new account. Returns `None` when a uniqueness constraint
    /// (id, email or provider identity) rejected the row.
    pub async fn create(&self, user: NewUser) -> Result<Option<users::Model>> {
        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(user.id),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            username: Set(user.username),
            avatar_url: Set(user.avatar_url),
            bio: Set(None),
            provider: Set(user.provider.as_str().to_string()),
            provider_id: Set(user.provider_id),
            is_admin: Set(false),
            is_active: Set(true),
            failed_login_attempts: Set(0),
            locked_until: Set(None),
            requires_two_factor: Set(false),
            must_reset_password: Set(false),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match model.insert(&self.conn).await {
            Ok(created) => Ok(Some(created)),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(None)
            }
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }

    /// Increments the failure counter and locks the account once it reaches
    /// `max_failures`. Both steps are single statements so concurrent
    /// failures cannot lose increments or lock twice.
    pub async fn record_failed_login(
        &self,
        id: &str,
        max_failures: i32,
        lock_for: Duration,
    ) -> Result<FailedLogin> {
        let now = Utc::now();

        Users::update_many()
            .col_expr(
                users::Column::FailedLoginAttempts,
                Expr::col(users::Column::FailedLoginAttempts).add(1),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to increment failed login counter")?;

        let until = now + lock_for;
        let locked = Users::update_many()
            .col_expr(users::Column::LockedUntil, Expr::value(Some(until)))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::FailedLoginAttempts.gte(max_failures))
            .filter(
                Condition::any()
                    .add(users::Column::LockedUntil.is_null())
                    .add(users::Column::LockedUntil.lte(now)),
            )
            .exec(&self.conn)
            .await
            .context("Failed to apply account lock")?;

        let attempts = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to reload user after failed login")?
            .map_or(0, |user| user.failed_login_attempts);

        Ok(FailedLogin {
            attempts,
            locked_until: (locked.rows_affected == 1).then_some(until),
        })
    }

    pub async fn record_successful_login(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        Users::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::LastLogin, Expr::value(Some(now)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record successful login")?;
        Ok(())
    }

    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        Users::update_many()
            .col_expr(users::Column::LastLogin, Expr::value(Some(now)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    /// Replaces the password hash and clears the forced-reset flag.
    pub async fn set_password(&self, id: &str, password_hash: String) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(Some(password_hash)))
            .col_expr(users::Column::MustResetPassword, Expr::value(false))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update password")?;
        Ok(result.rows_affected > 0)
    }

    /// Replaces the password with a server-generated one and lifts any lock.
    pub async fn rotate_password(&self, id: &str, password_hash: String) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(Some(password_hash)))
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to rotate password")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn lock_until(&self, id: &str, until: DateTime<Utc>) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::LockedUntil, Expr::value(Some(until)))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to lock account")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn require_two_factor(&self, id: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::RequiresTwoFactor, Expr::value(true))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to require two-factor authentication")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn require_password_reset(&self, id: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::MustResetPassword, Expr::value(true))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to flag password reset")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn update_profile(
        &self,
        id: &str,
        changes: ProfileChanges,
    ) -> Result<Option<users::Model>> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(bio) = changes.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(avatar_url) = changes.avatar_url {
            active.avatar_url = Set(Some(avatar_url));
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update profile")?;
        Ok(Some(updated))
    }

    pub async fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::IsAdmin, Expr::value(is_admin))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Email.eq(email))
            .exec(&self.conn)
            .await
            .context("Failed to update admin flag")?;
        Ok(result.rows_affected > 0)
    }

    /// Clears lock state for the account with this email.
    pub async fn unlock(&self, email: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Email.eq(email))
            .exec(&self.conn)
            .await
            .context("Failed to unlock account")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn count_locked(&self) -> Result<u64> {
        Users::find()
            .filter(users::Column::LockedUntil.gt(Utc::now()))
            .count(&self.conn)
            .await
            .context("Failed to count locked users")
    }
}
