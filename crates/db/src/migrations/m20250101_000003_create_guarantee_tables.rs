//! Create guarantee and rejection tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Guarantee::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Guarantee::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Guarantee::GuarantorId).integer().not_null())
                    .col(
                        ColumnDef::new(Guarantee::GuaranteedId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Guarantee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_guarantee_guarantor")
                            .from(Guarantee::Table, Guarantee::GuarantorId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_guarantee_guaranteed")
                            .from(Guarantee::Table, Guarantee::GuaranteedId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: guarantor_id (counting and listing guarantees given)
        manager
            .create_index(
                Index::create()
                    .name("idx_guarantee_guarantor_id")
                    .table(Guarantee::Table)
                    .col(Guarantee::GuarantorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rejection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rejection::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rejection::RejectorId).integer().not_null())
                    .col(ColumnDef::new(Rejection::RejectedId).integer().not_null())
                    .col(
                        ColumnDef::new(Rejection::Performed)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rejection_rejector")
                            .from(Rejection::Table, Rejection::RejectorId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rejection_rejected")
                            .from(Rejection::Table, Rejection::RejectedId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (rejector_id, rejected_id) - one cooldown row per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_rejection_pair")
                    .table(Rejection::Table)
                    .col(Rejection::RejectorId)
                    .col(Rejection::RejectedId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rejection::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Guarantee::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Guarantee {
    Table,
    Id,
    GuarantorId,
    GuaranteedId,
    CreatedAt,
}

#[derive(Iden)]
enum Rejection {
    Table,
    Id,
    RejectorId,
    RejectedId,
    Performed,
}

#[derive(Iden)]
enum Instance {
    Table,
    Id,
}
