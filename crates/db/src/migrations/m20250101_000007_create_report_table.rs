//! Create report (audit log) table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Report::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Report::SourceDomain).string_len(255).not_null())
                    .col(ColumnDef::new(Report::TargetDomain).string_len(255).not_null())
                    .col(ColumnDef::new(Report::ReportType).string_len(16).not_null())
                    .col(ColumnDef::new(Report::ReportActivity).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (source_domain, created_at) - rate limit window count
        manager
            .create_index(
                Index::create()
                    .name("idx_report_source_created")
                    .table(Report::Table)
                    .col(Report::SourceDomain)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_report_target_domain")
                    .table(Report::Table)
                    .col(Report::TargetDomain)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    SourceDomain,
    TargetDomain,
    ReportType,
    ReportActivity,
    CreatedAt,
}
