use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Random hex id for local accounts, derived from `(provider, provider_id)`
    /// for federated ones.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: Option<String>,

    /// Argon2id password hash; absent for federated-only accounts.
    pub password_hash: Option<String>,

    pub username: String,

    pub avatar_url: Option<String>,

    pub bio: Option<String>,

    pub provider: String,

    pub provider_id: String,

    pub is_admin: bool,

    pub is_active: bool,

    pub failed_login_attempts: i32,

    pub locked_until: Option<DateTimeUtc>,

    #[sea_orm(column_name = "requires_2fa")]
    pub requires_two_factor: bool,

    pub must_reset_password: bool,

    pub last_login: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sessions::Entity")]
    Sessions,
    #[sea_orm(has_many = "super::password_reset_tokens::Entity")]
    PasswordResetTokens,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::password_reset_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordResetTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
