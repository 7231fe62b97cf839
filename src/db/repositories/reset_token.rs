use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::entities::{password_reset_tokens, prelude::*, sessions, users};

pub struct ResetTokenRepository {
    conn: DatabaseConnection,
}

impl ResetTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: &str,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let model = password_reset_tokens::ActiveModel {
            user_id: Set(user_id.to_string()),
            token_hash: Set(token_hash),
            expires_at: Set(expires_at),
            used: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        PasswordResetTokens::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to insert password reset token")?;
        Ok(())
    }

    /// Consumes the token and installs the new password in one transaction.
    ///
    /// The token is claimed with a compare-and-set on `used`, so of two
    /// concurrent redemptions exactly one succeeds. Lock state, the forced
    /// reset flag and all live sessions of the user are cleared as well.
    /// Returns the user id, or `None` if the token is unknown, used or expired.
    pub async fn redeem(&self, token_hash: &str, password_hash: String) -> Result<Option<String>> {
        let now = Utc::now();
        let txn = self.conn.begin().await?;

        let claimed = PasswordResetTokens::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::TokenHash.eq(token_hash))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await
            .context("Failed to claim password reset token")?;

        if claimed.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(None);
        }

        let Some(token) = PasswordResetTokens::find()
            .filter(password_reset_tokens::Column::TokenHash.eq(token_hash))
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(Some(password_hash)))
            .col_expr(users::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                users::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::MustResetPassword, Expr::value(false))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(token.user_id.as_str()))
            .exec(&txn)
            .await
            .context("Failed to store new password")?;

        Sessions::update_many()
            .col_expr(sessions::Column::ExpiresAt, Expr::value(now))
            .filter(sessions::Column::UserId.eq(token.user_id.as_str()))
            .filter(sessions::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await
            .context("Failed to expire sessions after reset")?;

        txn.commit().await?;
        Ok(Some(token.user_id))
    }
}
