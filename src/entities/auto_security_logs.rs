use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "auto_security_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub threat_type: String,
    pub threat_level: String,
    pub source_ip: String,
    /// JSON object as submitted with the signal.
    pub details: Option<String>,
    /// `; `-joined remediation narrative, filled in after the actions ran.
    pub action_taken: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
