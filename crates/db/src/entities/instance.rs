//! Instance entity: a node of the trust graph.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who may read the edges an instance has given.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[derive(Default)]
pub enum ListVisibility {
    /// Anyone may read.
    #[sea_orm(string_value = "OPEN")]
    #[default]
    Open,
    /// Only the owner and instances the owner endorses.
    #[sea_orm(string_value = "ENDORSED")]
    Endorsed,
    /// Only the owner.
    #[sea_orm(string_value = "PRIVATE")]
    Private,
}

/// Federation participant.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instance")]
pub struct Model {
    /// Root instance is id 0.
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Lowercase hostname.
    #[sea_orm(unique)]
    pub domain: String,

    /// Lowercase software family name, `unknown` when never probed.
    pub software: String,

    pub open_registrations: bool,
    pub approval_required: bool,
    pub email_verify: bool,
    pub has_captcha: bool,

    /// Self-reported staff counts.
    pub sysadmins: Option<i32>,
    pub moderators: Option<i32>,

    pub visibility_endorsements: ListVisibility,
    pub visibility_censures: ListVisibility,
    pub visibility_hesitations: ListVisibility,

    /// Last time the guarantee chain above this instance broke.
    pub orphan_since: Option<DateTimeWithTimeZone>,

    /// Consecutive failed probes.
    #[sea_orm(default_value = 0)]
    pub poll_failures: i32,

    /// Outgoing edge cap per kind.
    pub max_list_size: i32,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::claim::Entity")]
    Claim,
    #[sea_orm(has_many = "super::instance_tag::Entity")]
    Tag,
    #[sea_orm(has_many = "super::instance_flag::Entity")]
    Flag,
}

impl Related<super::claim::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claim.def()
    }
}

impl Related<super::instance_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl Related<super::instance_flag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
