//! Endorsement, censure and hesitation repository.
//!
//! The three opinion tables share one layout. [`EdgeKind`] selects the table
//! and every row is returned as a uniform [`TrustEdge`].

use super::insert_err;
use crate::entities::{
    censure, endorsement, hesitation,
    instance::{self, ListVisibility},
    report::ReportType,
};
use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

/// Kind of opinion edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Endorsement,
    Censure,
    Hesitation,
}

impl EdgeKind {
    /// Kinds that may not coexist with this one on the same pair.
    #[must_use]
    pub const fn conflicting(self) -> &'static [Self] {
        match self {
            Self::Endorsement => &[Self::Censure, Self::Hesitation],
            Self::Censure | Self::Hesitation => &[Self::Endorsement],
        }
    }

    /// Audit log type for this kind.
    #[must_use]
    pub const fn report_type(self) -> ReportType {
        match self {
            Self::Endorsement => ReportType::Endorsement,
            Self::Censure => ReportType::Censure,
            Self::Hesitation => ReportType::Hesitation,
        }
    }

    /// Whether edges of this kind carry evidence.
    #[must_use]
    pub const fn has_evidence(self) -> bool {
        !matches!(self, Self::Endorsement)
    }

    /// Singular noun.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Endorsement => "endorsement",
            Self::Censure => "censure",
            Self::Hesitation => "hesitation",
        }
    }

    /// Verb used in gate messages ("Only guaranteed instances can ...").
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Endorsement => "endorse",
            Self::Censure => "censure",
            Self::Hesitation => "hesitate",
        }
    }

    /// The source's visibility policy for edges of this kind.
    #[must_use]
    pub const fn visibility_of(self, instance: &instance::Model) -> ListVisibility {
        match self {
            Self::Endorsement => instance.visibility_endorsements,
            Self::Censure => instance.visibility_censures,
            Self::Hesitation => instance.visibility_hesitations,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.noun())
    }
}

/// An opinion edge of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustEdge {
    pub id: i32,
    pub kind: EdgeKind,
    pub source_id: i32,
    pub target_id: i32,
    pub reason: Option<String>,
    pub evidence: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl TrustEdge {
    /// Whether the payload matches.
    #[must_use]
    pub fn same_payload(&self, reason: Option<&str>, evidence: Option<&str>) -> bool {
        self.reason.as_deref() == reason && self.evidence.as_deref() == evidence
    }
}

macro_rules! edge_from_model {
    ($table:ident, $kind:expr) => {
        impl From<$table::Model> for TrustEdge {
            fn from(m: $table::Model) -> Self {
                Self {
                    id: m.id,
                    kind: $kind,
                    source_id: m.source_id,
                    target_id: m.target_id,
                    reason: m.reason,
                    evidence: m.evidence,
                    created_at: m.created_at,
                }
            }
        }
    };
}

edge_from_model!(endorsement, EdgeKind::Endorsement);
edge_from_model!(censure, EdgeKind::Censure);
edge_from_model!(hesitation, EdgeKind::Hesitation);

/// Run `$body` with `$t` bound to the entity module of `$kind`.
macro_rules! with_table {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            EdgeKind::Endorsement => {
                use crate::entities::endorsement as $t;
                $body
            }
            EdgeKind::Censure => {
                use crate::entities::censure as $t;
                $body
            }
            EdgeKind::Hesitation => {
                use crate::entities::hesitation as $t;
                $body
            }
        }
    };
}

fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Repository over the three opinion tables.
pub struct TrustEdgeRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TrustEdgeRepository<'a, C> {
    /// Create a new trust edge repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find the edge of `kind` from `source_id` to `target_id`.
    pub async fn find(
        &self,
        kind: EdgeKind,
        source_id: i32,
        target_id: i32,
    ) -> AppResult<Option<TrustEdge>> {
        with_table!(kind, t => {
            t::Entity::find()
                .filter(t::Column::SourceId.eq(source_id))
                .filter(t::Column::TargetId.eq(target_id))
                .one(self.db)
                .await
                .map(|m| m.map(TrustEdge::from))
                .map_err(db_err)
        })
    }

    /// Whether an edge of `kind` exists on the pair.
    pub async fn exists(&self, kind: EdgeKind, source_id: i32, target_id: i32) -> AppResult<bool> {
        Ok(self.find(kind, source_id, target_id).await?.is_some())
    }

    /// Edges given by any of `source_ids`.
    pub async fn find_by_sources(
        &self,
        kind: EdgeKind,
        source_ids: &[i32],
    ) -> AppResult<Vec<TrustEdge>> {
        if source_ids.is_empty() {
            return Ok(vec![]);
        }
        with_table!(kind, t => {
            t::Entity::find()
                .filter(t::Column::SourceId.is_in(source_ids.iter().copied()))
                .order_by_asc(t::Column::Id)
                .all(self.db)
                .await
                .map(|v| v.into_iter().map(TrustEdge::from).collect())
                .map_err(db_err)
        })
    }

    /// Edges received by any of `target_ids`.
    pub async fn find_by_targets(
        &self,
        kind: EdgeKind,
        target_ids: &[i32],
    ) -> AppResult<Vec<TrustEdge>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }
        with_table!(kind, t => {
            t::Entity::find()
                .filter(t::Column::TargetId.is_in(target_ids.iter().copied()))
                .order_by_asc(t::Column::Id)
                .all(self.db)
                .await
                .map(|v| v.into_iter().map(TrustEdge::from).collect())
                .map_err(db_err)
        })
    }

    /// Number of edges of `kind` given by `source_id`.
    pub async fn count_by_source(&self, kind: EdgeKind, source_id: i32) -> AppResult<u64> {
        with_table!(kind, t => {
            t::Entity::find()
                .filter(t::Column::SourceId.eq(source_id))
                .count(self.db)
                .await
                .map_err(db_err)
        })
    }

    /// Whether `target_id` received an edge of `kind` after `since`.
    pub async fn received_since(
        &self,
        kind: EdgeKind,
        target_id: i32,
        since: DateTime<FixedOffset>,
    ) -> AppResult<bool> {
        let count = with_table!(kind, t => {
            t::Entity::find()
                .filter(t::Column::TargetId.eq(target_id))
                .filter(t::Column::CreatedAt.gt(since))
                .count(self.db)
                .await
                .map_err(db_err)
        })?;
        Ok(count > 0)
    }

    /// Create an edge.
    ///
    /// The pair is unique per table, so a concurrent insert of the same edge
    /// surfaces as a conflict.
    pub async fn create(
        &self,
        kind: EdgeKind,
        source_id: i32,
        target_id: i32,
        reason: Option<String>,
        evidence: Option<String>,
    ) -> AppResult<TrustEdge> {
        let now = chrono::Utc::now().fixed_offset();
        let evidence = if kind.has_evidence() { evidence } else { None };
        with_table!(kind, t => {
            t::ActiveModel {
                source_id: Set(source_id),
                target_id: Set(target_id),
                reason: Set(reason),
                evidence: Set(evidence),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(self.db)
            .await
            .map(TrustEdge::from)
            .map_err(|e| insert_err(&e, &format!("The {kind} was added concurrently")))
        })
    }

    /// Replace the payload of an edge.
    pub async fn update_payload(
        &self,
        kind: EdgeKind,
        id: i32,
        reason: Option<String>,
        evidence: Option<String>,
    ) -> AppResult<TrustEdge> {
        let evidence = if kind.has_evidence() { evidence } else { None };
        with_table!(kind, t => {
            t::ActiveModel {
                id: Set(id),
                reason: Set(reason),
                evidence: Set(evidence),
                ..Default::default()
            }
            .update(self.db)
            .await
            .map(TrustEdge::from)
            .map_err(db_err)
        })
    }

    /// Delete an edge by ID.
    pub async fn delete(&self, kind: EdgeKind, id: i32) -> AppResult<()> {
        self.delete_many(kind, &[id]).await.map(|_| ())
    }

    /// Delete several edges of one kind.
    pub async fn delete_many(&self, kind: EdgeKind, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        with_table!(kind, t => {
            t::Entity::delete_many()
                .filter(t::Column::Id.is_in(ids.iter().copied()))
                .exec(self.db)
                .await
                .map(|r| r.rows_affected)
                .map_err(db_err)
        })
    }
}
