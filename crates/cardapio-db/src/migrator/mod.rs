//! Database migrations
//!
//! Applied in order at startup; a failing migration aborts the process.

use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_catalog;
mod m20240415_000001_add_facebook_login;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_catalog::Migration),
            Box::new(m20240415_000001_add_facebook_login::Migration),
        ]
    }
}
