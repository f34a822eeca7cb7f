//! Create solicitation table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Solicitation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Solicitation::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Solicitation::SourceId).integer().not_null())
                    .col(ColumnDef::new(Solicitation::TargetId).integer().null())
                    .col(ColumnDef::new(Solicitation::Comment).text().null())
                    .col(
                        ColumnDef::new(Solicitation::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_solicitation_source")
                            .from(Solicitation::Table, Solicitation::SourceId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_solicitation_target")
                            .from(Solicitation::Table, Solicitation::TargetId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (source_id, target_id). Open calls (NULL target) are
        // deduplicated by the service since NULLs never collide here.
        manager
            .create_index(
                Index::create()
                    .name("idx_solicitation_source_target")
                    .table(Solicitation::Table)
                    .col(Solicitation::SourceId)
                    .col(Solicitation::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Solicitation::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Solicitation {
    Table,
    Id,
    SourceId,
    TargetId,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum Instance {
    Table,
    Id,
}
