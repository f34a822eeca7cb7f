//! Solicitation entity (request for a guarantee).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "solicitation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The instance asking for a guarantee
    pub source_id: i32,

    /// The instance being asked. `None` is an open call.
    pub target_id: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

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
