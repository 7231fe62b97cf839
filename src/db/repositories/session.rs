use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::ClientMeta;
use crate::entities::{prelude::*, sessions};

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: &str,
        token_hash: String,
        client: &ClientMeta,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let model = sessions::ActiveModel {
            user_id: Set(user_id.to_string()),
            token_hash: Set(token_hash),
            ip_address: Set(client.ip.clone()),
            user_agent: Set(client.user_agent.clone()),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        Sessions::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to insert session")?;
        Ok(())
    }

    /// Returns the session only while it has not expired.
    pub async fn find_active(&self, token_hash: &str) -> Result<Option<sessions::Model>> {
        Sessions::find()
            .filter(sessions::Column::TokenHash.eq(token_hash))
            .filter(sessions::Column::ExpiresAt.gt(Utc::now()))
            .one(&self.conn)
            .await
            .context("Failed to query session")
    }

    pub async fn expire(&self, token_hash: &str) -> Result<u64> {
        let now = Utc::now();
        let result = Sessions::update_many()
            .col_expr(sessions::Column::ExpiresAt, Expr::value(now))
            .filter(sessions::Column::TokenHash.eq(token_hash))
            .filter(sessions::Column::ExpiresAt.gt(now))
            .exec(&self.conn)
            .await
            .context("Failed to expire session")?;
        Ok(result.rows_affected)
    }

    /// Ends every live session of the user. Returns how many were ended.
    pub async fn expire_all_for_user(&self, user_id: &str) -> Result<u64> {
        let now = Utc::now();
        let result = Sessions::update_many()
            .col_expr(sessions::Column::ExpiresAt, Expr::value(now))
            .filter(sessions::Column::UserId.eq(user_id))
            .filter(sessions::Column::ExpiresAt.gt(now))
            .exec(&self.conn)
            .await
            .context("Failed to expire user sessions")?;
        Ok(result.rows_affected)
    }
}
