use sea_orm_migration::prelude::*;

mod m20240301_create_accounts;
mod m20240315_add_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_create_accounts::Migration),
            Box::new(m20240315_add_audit_logs::Migration),
        ]
    }
}
