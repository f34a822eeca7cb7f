//! Rejection entity: last time a guarantor withdrew from a target.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rejection")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub rejector_id: i32,

    pub rejected_id: i32,

    pub performed: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::RejectorId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Rejector,

    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::RejectedId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Rejected,
}

impl ActiveModelBehavior for ActiveModel {}
