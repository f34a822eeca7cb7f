//! Database migrations.
//!
//! Schema migrations for the trust graph.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_instance_table;
mod m20250101_000002_create_identity_tables;
mod m20250101_000003_create_guarantee_tables;
mod m20250101_000004_create_trust_edge_tables;
mod m20250101_000005_create_solicitation_table;
mod m20250101_000006_create_moderation_tables;
mod m20250101_000007_create_report_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_instance_table::Migration),
            Box::new(m20250101_000002_create_identity_tables::Migration),
            Box::new(m20250101_000003_create_guarantee_tables::Migration),
            Box::new(m20250101_000004_create_trust_edge_tables::Migration),
            Box::new(m20250101_000005_create_solicitation_table::Migration),
            Box::new(m20250101_000006_create_moderation_tables::Migration),
            Box::new(m20250101_000007_create_report_table::Migration),
        ]
    }
}
