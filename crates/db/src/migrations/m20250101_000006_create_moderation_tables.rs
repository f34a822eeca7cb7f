//! Create instance flag and tag tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InstanceFlag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstanceFlag::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InstanceFlag::InstanceId).integer().not_null())
                    .col(ColumnDef::new(InstanceFlag::Flag).string_len(16).not_null())
                    .col(ColumnDef::new(InstanceFlag::Comment).string_len(255).null())
                    .col(
                        ColumnDef::new(InstanceFlag::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_flag_instance")
                            .from(InstanceFlag::Table, InstanceFlag::InstanceId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instance_flag_instance_flag")
                    .table(InstanceFlag::Table)
                    .col(InstanceFlag::InstanceId)
                    .col(InstanceFlag::Flag)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InstanceTag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstanceTag::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InstanceTag::InstanceId).integer().not_null())
                    .col(ColumnDef::new(InstanceTag::Tag).string_len(100).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_tag_instance")
                            .from(InstanceTag::Table, InstanceTag::InstanceId)
                            .to(Instance::Table, Instance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instance_tag_instance_tag")
                    .table(InstanceTag::Table)
                    .col(InstanceTag::InstanceId)
                    .col(InstanceTag::Tag)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: tag (whitelist filter and tag counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_instance_tag_tag")
                    .table(InstanceTag::Table)
                    .col(InstanceTag::Tag)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InstanceTag::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InstanceFlag::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum InstanceFlag {
    Table,
    Id,
    InstanceId,
    Flag,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum InstanceTag {
    Table,
    Id,
    InstanceId,
    Tag,
}

#[derive(Iden)]
enum Instance {
    Table,
    Id,
}
