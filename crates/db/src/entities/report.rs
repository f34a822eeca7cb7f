//! Audit log entry. Append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What kind of record was touched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    #[sea_orm(string_value = "GUARANTEE")]
    Guarantee,
    #[sea_orm(string_value = "ENDORSEMENT")]
    Endorsement,
    #[sea_orm(string_value = "CENSURE")]
    Censure,
    #[sea_orm(string_value = "HESITATION")]
    Hesitation,
    #[sea_orm(string_value = "REBUTTAL")]
    Rebuttal,
    #[sea_orm(string_value = "SOLICITATION")]
    Solicitation,
    #[sea_orm(string_value = "FLAG")]
    Flag,
    #[sea_orm(string_value = "CLAIM")]
    Claim,
}

/// What happened to it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportActivity {
    #[sea_orm(string_value = "ADDED")]
    Added,
    #[sea_orm(string_value = "DELETED")]
    Deleted,
    #[sea_orm(string_value = "MODIFIED")]
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub source_domain: String,

    /// A domain, `[REDACTED]` or `[MULTIPLE]`.
    pub target_domain: String,

    pub report_type: ReportType,

    pub report_activity: ReportActivity,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
