//! Hesitation entity (weak negative opinion between instances).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hesitation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub source_id: i32,

    pub target_id: i32,

    pub reason: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub evidence: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::SourceId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Source,

    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::TargetId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
