use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::users;

/// Public view of an account. Credentials and lockout counters never leave
/// the service layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub provider: String,
    pub is_admin: bool,
    #[serde(rename = "requires_2fa")]
    pub requires_two_factor: bool,
    pub must_reset_password: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserProfile {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            avatar_url: model.avatar_url,
            bio: model.bio,
            provider: model.provider,
            is_admin: model.is_admin,
            requires_two_factor: model.requires_two_factor,
            must_reset_password: model.must_reset_password,
            last_login: model.last_login,
            created_at: model.created_at,
        }
    }
}
