//! Operator-issued moderation flag on an instance.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moderation mark.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    /// May not originate any trust action.
    #[sea_orm(string_value = "RESTRICTED")]
    Restricted,
    /// Visibilities pinned to private.
    #[sea_orm(string_value = "MUTED")]
    Muted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instance_flag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub instance_id: i32,

    pub flag: FlagKind,

    pub comment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::instance::Entity",
        from = "Column::InstanceId",
        to = "super::instance::Column::Id",
        on_delete = "Cascade"
    )]
    Instance,
}

impl Related<super::instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
