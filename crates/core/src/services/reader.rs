//! Read side of the trust graph.
//!
//! Every edge listing is filtered through the owning instance's visibility
//! policy before anything else is applied. A "given by" query whose reference
//! set is entirely hidden fails with Forbidden instead of returning nothing.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult, normalize_domain, parse_domain_csv};
use fediseer_db::{
    entities::{instance, instance_flag::FlagKind},
    repositories::{
        EdgeKind, FlagRepository, InstanceRepository, RebuttalRepository, TrustEdgeRepository,
    },
};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use super::{
    context::{ServiceContext, load_tree},
    view::{InstanceView, build_view, build_views},
};
use crate::{
    reasons::{ReasonFilter, passes_threshold},
    settings::ago,
    visibility::ViewerScope,
};

/// Whitelist filter.
#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistFilter {
    #[serde(default)]
    pub min_endorsements: usize,
    #[serde(default = "default_min_guarantors")]
    pub min_guarantors: usize,
    /// Comma-separated tags; any match keeps the instance.
    #[serde(default)]
    pub tags: Option<String>,
    /// Comma-separated software families.
    #[serde(default)]
    pub software: Option<String>,
}

const fn default_min_guarantors() -> usize {
    1
}

impl Default for WhitelistFilter {
    fn default() -> Self {
        Self {
            min_endorsements: 0,
            min_guarantors: default_min_guarantors(),
            tags: None,
            software: None,
        }
    }
}

/// Filter for "given by" queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GivenQuery {
    /// Comma-separated reason terms.
    #[serde(default)]
    pub reasons: Option<String>,
    /// Minimum number of reference instances that must agree.
    #[serde(default)]
    pub min: Option<usize>,
}

/// A target judged by the reference set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgedInstance {
    #[serde(flatten)]
    pub instance: InstanceView,
    pub reasons: Vec<String>,
    pub evidence: Vec<String>,
    pub count: usize,
}

/// An edge received by an instance, seen from its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedEdge {
    #[serde(flatten)]
    pub source: InstanceView,
    pub reason: Option<String>,
    pub evidence: Option<String>,
    /// The target's answer, for censures and hesitations.
    pub rebuttal: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Default)]
struct Judgments {
    reasons: Vec<String>,
    evidence: Vec<String>,
    count: usize,
}

/// Reader service.
#[derive(Clone)]
pub struct ReaderService {
    ctx: ServiceContext,
}

impl ReaderService {
    /// Create a new reader service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Guaranteed instances that pass `filter`.
    pub async fn whitelist(&self, filter: &WhitelistFilter) -> AppResult<Vec<InstanceView>> {
        let conn = self.ctx.db.as_ref();
        let settings = &self.ctx.settings;

        let software = filter
            .software
            .as_deref()
            .map(split_lowercase)
            .filter(|s| !s.is_empty());
        let tags: HashSet<String> = filter
            .tags
            .as_deref()
            .map(split_lowercase)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let instances = InstanceRepository::new(conn)
            .find_all(software.as_deref())
            .await?;
        let tree = load_tree(conn, settings).await?;

        let orphan_cutoff = ago(settings.trust.orphan_grace_secs);
        let candidates: Vec<instance::Model> = instances
            .into_iter()
            .filter(|i| i.orphan_since.is_none_or(|since| since > orphan_cutoff))
            .filter(|i| usize::from(tree.has_guarantor(i.id)) >= filter.min_guarantors)
            .collect();

        let views: Vec<InstanceView> = build_views(conn, settings, &tree, candidates)
            .await?
            .into_iter()
            .filter(|v| v.endorsements >= filter.min_endorsements)
            .filter(|v| tags.is_empty() || v.tags.iter().any(|t| tags.contains(t)))
            .collect();

        tracing::debug!(count = views.len(), "Built whitelist");
        Ok(views)
    }

    /// Details of one registered instance.
    pub async fn instance_details(&self, domain: &str) -> AppResult<InstanceView> {
        let conn = self.ctx.db.as_ref();
        let domain = normalize_domain(domain)?;
        let instance = InstanceRepository::new(conn).get_by_domain(&domain).await?;
        let tree = load_tree(conn, &self.ctx.settings).await?;
        build_view(conn, &self.ctx.settings, &tree, instance).await
    }

    /// Targets judged with `kind` by the instances in `domains_csv`.
    #[tracing::instrument(skip(self, requester, query), fields(requester = ?requester.map(|r| &r.domain)))]
    pub async fn given_by(
        &self,
        kind: EdgeKind,
        requester: Option<&instance::Model>,
        domains_csv: &str,
        query: &GivenQuery,
    ) -> AppResult<Vec<JudgedInstance>> {
        let conn = self.ctx.db.as_ref();
        let domains = parse_domain_csv(domains_csv)?;

        let sources = InstanceRepository::new(conn).find_by_domains(&domains).await?;
        if sources.is_empty() {
            return Err(AppError::NotFound(format!(
                "No registered instance among: {domains_csv}"
            )));
        }

        let scope = viewer_scope(conn, requester).await?;
        let visible: Vec<i32> = sources
            .iter()
            .filter(|s| scope.can_view(kind, s))
            .map(|s| s.id)
            .collect();
        if visible.is_empty() {
            return Err(AppError::Forbidden(format!(
                "You do not have access to see these {}s.",
                kind.noun()
            )));
        }

        let min = query.min.unwrap_or(1);
        if min > visible.len() {
            return Err(AppError::BadRequest(format!(
                "Cannot request a minimum of {min} {}s from {} visible instances.",
                kind.noun(),
                visible.len()
            )));
        }
        let filter = ReasonFilter::parse(query.reasons.as_deref());

        let mut judged: BTreeMap<i32, Judgments> = BTreeMap::new();
        for edge in TrustEdgeRepository::new(conn)
            .find_by_sources(kind, &visible)
            .await?
        {
            let entry = judged.entry(edge.target_id).or_default();
            entry.count += 1;
            entry.reasons.extend(edge.reason);
            entry.evidence.extend(edge.evidence);
        }
        judged.retain(|_, j| {
            let reasons: Vec<&str> = j.reasons.iter().map(String::as_str).collect();
            passes_threshold(filter.as_ref(), &reasons, j.count, min)
        });

        let tree = load_tree(conn, &self.ctx.settings).await?;
        let target_ids: Vec<i32> = judged.keys().copied().collect();
        let targets = InstanceRepository::new(conn).find_by_ids(&target_ids).await?;
        let mut views = build_views(conn, &self.ctx.settings, &tree, targets).await?;
        views.sort_by(|a, b| a.domain.cmp(&b.domain));

        let results: Vec<JudgedInstance> = views
            .into_iter()
            .filter_map(|view| {
                let j = judged.remove(&view.id)?;
                Some(JudgedInstance {
                    instance: view,
                    reasons: j.reasons,
                    evidence: j.evidence,
                    count: j.count,
                })
            })
            .collect();

        tracing::debug!(kind = %kind, sources = visible.len(), count = results.len(), "Listed given edges");
        Ok(results)
    }

    /// Edges of `kind` that `domain` received, from sources the requester may see.
    #[tracing::instrument(skip(self, requester), fields(requester = ?requester.map(|r| &r.domain)))]
    pub async fn received_by(
        &self,
        kind: EdgeKind,
        requester: Option<&instance::Model>,
        domain: &str,
    ) -> AppResult<Vec<ReceivedEdge>> {
        let conn = self.ctx.db.as_ref();
        let domain = normalize_domain(domain)?;
        let target = InstanceRepository::new(conn).get_by_domain(&domain).await?;

        let edges = TrustEdgeRepository::new(conn)
            .find_by_targets(kind, &[target.id])
            .await?;
        let source_ids: Vec<i32> = edges.iter().map(|e| e.source_id).collect();
        let sources = InstanceRepository::new(conn).find_by_ids(&source_ids).await?;

        let scope = viewer_scope(conn, requester).await?;
        let visible: Vec<instance::Model> = sources
            .into_iter()
            .filter(|s| scope.can_view(kind, s))
            .collect();
        let visible_ids: Vec<i32> = visible.iter().map(|s| s.id).collect();

        let rebuttals = if kind.has_evidence()
            && !FlagRepository::new(conn)
                .has_flag(target.id, FlagKind::Muted)
                .await?
        {
            RebuttalRepository::new(conn)
                .find_by_source(target.id, &visible_ids)
                .await?
        } else {
            vec![]
        };

        let tree = load_tree(conn, &self.ctx.settings).await?;
        let views = build_views(conn, &self.ctx.settings, &tree, visible).await?;

        let received: Vec<ReceivedEdge> = views
            .into_iter()
            .filter_map(|source| {
                let edge = edges.iter().find(|e| e.source_id == source.id)?;
                let rebuttal = rebuttals
                    .iter()
                    .find(|r| r.target_id == source.id)
                    .map(|r| r.rebuttal.clone());
                Some(ReceivedEdge {
                    reason: edge.reason.clone(),
                    evidence: edge.evidence.clone(),
                    rebuttal,
                    created_at: edge.created_at,
                    source,
                })
            })
            .collect();

        Ok(received)
    }

    /// Instances directly guaranteed by `domain`.
    pub async fn guarantees_given_by(&self, domain: &str) -> AppResult<Vec<InstanceView>> {
        let conn = self.ctx.db.as_ref();
        let domain = normalize_domain(domain)?;
        let guarantor = InstanceRepository::new(conn).get_by_domain(&domain).await?;
        let tree = load_tree(conn, &self.ctx.settings).await?;

        let guaranteed = InstanceRepository::new(conn)
            .find_by_ids(tree.guarantees_of(guarantor.id))
            .await?;
        build_views(conn, &self.ctx.settings, &tree, guaranteed).await
    }

    /// The guarantor of `domain`, if any. The root has none.
    pub async fn guarantor_of(&self, domain: &str) -> AppResult<Option<InstanceView>> {
        let conn = self.ctx.db.as_ref();
        let domain = normalize_domain(domain)?;
        let instance = InstanceRepository::new(conn).get_by_domain(&domain).await?;
        let tree = load_tree(conn, &self.ctx.settings).await?;

        let Some(guarantor_id) = tree.guarantor_of(instance.id).filter(|g| *g != instance.id)
        else {
            return Ok(None);
        };
        let Some(guarantor) = InstanceRepository::new(conn).find_by_id(guarantor_id).await? else {
            return Ok(None);
        };
        build_view(conn, &self.ctx.settings, &tree, guarantor)
            .await
            .map(Some)
    }
}

/// Load who the requester endorses, for ENDORSED lists.
async fn viewer_scope<C: ConnectionTrait>(
    conn: &C,
    requester: Option<&instance::Model>,
) -> AppResult<ViewerScope> {
    let Some(requester) = requester else {
        return Ok(ViewerScope::anonymous());
    };
    let endorsed = TrustEdgeRepository::new(conn)
        .find_by_sources(EdgeKind::Endorsement, &[requester.id])
        .await?;
    Ok(ViewerScope::new(
        requester.id,
        endorsed.into_iter().map(|e| e.target_id),
    ))
}

fn split_lowercase(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        probe::test_support::StaticProbe,
        test_support::{context, instance_model},
    };
    use fediseer_db::entities::{
        censure, claim, endorsement, guarantee, instance::ListVisibility, instance_flag,
        instance_tag,
    };
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn guarantee_model(id: i32, guarantor_id: i32, guaranteed_id: i32) -> guarantee::Model {
        guarantee::Model {
            id,
            guarantor_id,
            guaranteed_id,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn censure_model(id: i32, source_id: i32, target_id: i32, reason: &str) -> censure::Model {
        censure::Model {
            id,
            source_id,
            target_id,
            reason: Some(reason.to_string()),
            evidence: None,
            created_at: chrono::Utc::now().into(),
        }
    }

    /// Empty results for the bulk lookups in `build_views`.
    fn with_empty_view_rows(db: MockDatabase) -> MockDatabase {
        db.append_query_results([Vec::<claim::Model>::new()])
            .append_query_results([Vec::<endorsement::Model>::new()])
            .append_query_results([Vec::<instance_tag::Model>::new()])
            .append_query_results([Vec::<instance_flag::Model>::new()])
    }

    #[tokio::test]
    async fn test_given_by_unknown_sources_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<instance::Model>::new()]);
        let service = ReaderService::new(context(db, StaticProbe::default()));

        let result = service
            .given_by(EdgeKind::Censure, None, "a.example", &GivenQuery::default())
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_given_by_hidden_sources_forbidden() {
        let mut source = instance_model(1, "a.example");
        source.visibility_censures = ListVisibility::Endorsed;
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[source]]);
        let service = ReaderService::new(context(db, StaticProbe::default()));

        let result = service
            .given_by(EdgeKind::Censure, None, "a.example", &GivenQuery::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_given_by_min_above_visible_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(1, "a.example")]]);
        let service = ReaderService::new(context(db, StaticProbe::default()));

        let result = service
            .given_by(
                EdgeKind::Censure,
                None,
                "a.example",
                &GivenQuery {
                    reasons: None,
                    min: Some(2),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_given_by_filters_reasons() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(1, "a.example")]])
            .append_query_results([[
                censure_model(1, 1, 2, "Spam, ads"),
                censure_model(2, 1, 3, "loud"),
            ]])
            .append_query_results([[guarantee_model(1, 0, 0)]])
            .append_query_results([[instance_model(2, "b.example")]]);
        let db = with_empty_view_rows(db);
        let service = ReaderService::new(context(db, StaticProbe::default()));

        let judged = service
            .given_by(
                EdgeKind::Censure,
                None,
                "a.example",
                &GivenQuery {
                    reasons: Some("SPAM".to_string()),
                    min: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].instance.domain, "b.example");
        assert_eq!(judged[0].reasons, vec!["Spam, ads".to_string()]);
        assert_eq!(judged[0].count, 1);
    }

    #[tokio::test]
    async fn test_received_by_hides_private_sources() {
        let mut private = instance_model(1, "a.example");
        private.visibility_endorsements = ListVisibility::Private;
        let endorsement = endorsement::Model {
            id: 1,
            source_id: 1,
            target_id: 2,
            reason: None,
            evidence: None,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(2, "b.example")]])
            .append_query_results([[endorsement]])
            .append_query_results([[private]])
            .append_query_results([[guarantee_model(1, 0, 0)]]);
        let service = ReaderService::new(context(db, StaticProbe::default()));

        let received = service
            .received_by(EdgeKind::Endorsement, None, "b.example")
            .await
            .unwrap();

        assert!(received.is_empty());
    }

    #[test]
    fn test_whitelist_filter_defaults() {
        let filter = WhitelistFilter::default();
        assert_eq!(filter.min_guarantors, 1);
        assert_eq!(filter.min_endorsements, 0);
        assert_eq!(split_lowercase("Lemmy, ,Mastodon"), vec!["lemmy", "mastodon"]);
    }
}
