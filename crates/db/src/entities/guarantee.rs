//! Guarantee entity (guarantor vouches for guaranteed).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guarantee")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The instance giving the guarantee
    pub guarantor_id: i32,

    /// The instance being guaranteed. At most one guarantor each.
    #[sea_orm(unique)]
    pub guaranteed_id: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::GuarantorId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Guarantor,

    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::GuaranteedId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Guaranteed,
}

impl ActiveModelBehavior for ActiveModel {}
