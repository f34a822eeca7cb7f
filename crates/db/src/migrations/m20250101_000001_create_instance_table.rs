//! Create instance table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Instance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Instance::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Instance::Domain)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Instance::Software)
                            .string_len(64)
                            .not_null()
                            .default("unknown"),
                    )
                    .col(
                        ColumnDef::new(Instance::OpenRegistrations)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Instance::ApprovalRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Instance::EmailVerify)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Instance::HasCaptcha)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Instance::Sysadmins).integer().null())
                    .col(ColumnDef::new(Instance::Moderators).integer().null())
                    .col(
                        ColumnDef::new(Instance::VisibilityEndorsements)
                            .string_len(16)
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(
                        ColumnDef::new(Instance::VisibilityCensures)
                            .string_len(16)
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(
                        ColumnDef::new(Instance::VisibilityHesitations)
                            .string_len(16)
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(
                        ColumnDef::new(Instance::OrphanSince)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Instance::PollFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Instance::MaxListSize)
                            .integer()
                            .not_null()
                            .default(1000),
                    )
                    .col(
                        ColumnDef::new(Instance::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Instance::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: software (whitelist filter)
        manager
            .create_index(
                Index::create()
                    .name("idx_instance_software")
                    .table(Instance::Table)
                    .col(Instance::Software)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Instance::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Instance {
    Table,
    Id,
    Domain,
    Software,
    OpenRegistrations,
    ApprovalRequired,
    EmailVerify,
    HasCaptcha,
    Sysadmins,
    Moderators,
    VisibilityEndorsements,
    VisibilityCensures,
    VisibilityHesitations,
    OrphanSince,
    PollFailures,
    MaxListSize,
    CreatedAt,
    UpdatedAt,
}
