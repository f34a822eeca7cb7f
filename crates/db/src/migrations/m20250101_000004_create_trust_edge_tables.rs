//! Create endorsement, censure, hesitation and rebuttal tables migration.
//!
//! The three opinion tables share one layout and differ only in name.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const EDGE_TABLES: [&str; 3] = ["endorsement", "censure", "hesitation"];

fn edge_table(name: &str) -> TableCreateStatement {
    let table = Alias::new(name);
    Table::create()
        .table(table.clone())
        .if_not_exists()
        .col(
            ColumnDef::new(Edge::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Edge::SourceId).integer().not_null())
        .col(ColumnDef::new(Edge::TargetId).integer().not_null())
        .col(ColumnDef::new(Edge::Reason).string_len(255).null())
        .col(ColumnDef::new(Edge::Evidence).text().null())
        .col(
            ColumnDef::new(Edge::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{name}_source"))
                .from(table.clone(), Edge::SourceId)
                .to(Instance::Table, Instance::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{name}_target"))
                .from(table, Edge::TargetId)
                .to(Instance::Table, Instance::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in EDGE_TABLES {
            manager.create_table(edge_table(name)).await?;

            // Unique index: (source_id, target_id) - one opinion per pair
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{name}_source_target"))
                        .table(Alias::new(name))
                        .col(Edge::SourceId)
                        .col(Edge::TargetId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Index: target_id (edges received)
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{name}_target_id"))
                        .table(Alias::new(name))
                        .col(Edge::TargetId)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Rebuttal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rebuttal::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rebuttal::SourceId).integer().not_null())
                    .col(ColumnDef::new(Rebuttal::TargetId).integer().not_null())
                    .col(ColumnDef::new(Rebuttal::Rebuttal).text().not_null())
                    .col(
                        ColumnDef::new(Rebuttal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Rebuttal::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rebuttal_source")
                            .from(Rebuttal::Table, Rebuttal::SourceId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rebuttal_target")
                            .from(Rebuttal::Table, Rebuttal::TargetId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rebuttal_source_target")
                    .table(Rebuttal::Table)
                    .col(Rebuttal::SourceId)
                    .col(Rebuttal::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rebuttal::Table).to_owned())
            .await?;
        for name in EDGE_TABLES {
            manager
                .drop_table(Table::drop().table(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
enum Edge {
    Id,
    SourceId,
    TargetId,
    Reason,
    Evidence,
    CreatedAt,
}

#[derive(Iden)]
enum Rebuttal {
    Table,
    Id,
    SourceId,
    TargetId,
    Rebuttal,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Instance {
    Table,
    Id,
}
