//! Endorsement, censure and hesitation service.

use std::collections::{HashMap, HashSet};

use fediseer_common::{AppError, AppResult, normalize_domain, sanitize_text, text::MAX_REASON_LEN};
use fediseer_db::{
    entities::{instance, report::ReportActivity},
    repositories::{EdgeKind, InstanceRepository, MULTIPLE_TARGETS, ReportRepository, TrustEdgeRepository},
};
use sea_orm::TransactionTrait;
use serde::Deserialize;

use super::{
    context::{Mutation, ServiceContext, gate_actor, record_edge_report},
    registry::RegistryService,
};
use crate::{
    batch::{self, BatchContext, BatchEntry, BatchOutcome},
    gate::{ActionGate, TrustAction},
    settings::ago,
};

/// Optional payload of an edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeInput {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

impl EdgeInput {
    /// Sanitized `(reason, evidence)` for `kind`.
    fn clean(&self, kind: EdgeKind) -> (Option<String>, Option<String>) {
        let reason = sanitize_text(self.reason.as_deref(), Some(MAX_REASON_LEN));
        let evidence = if kind.has_evidence() {
            sanitize_text(self.evidence.as_deref(), None)
        } else {
            None
        };
        (reason, evidence)
    }
}

/// Batch upsert request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub entries: Vec<BatchEntry>,
    /// Remove existing edges whose target is not listed.
    #[serde(default)]
    pub delete: bool,
    /// Replace the payload of existing edges.
    #[serde(default)]
    pub overwrite: bool,
}

/// Trust edge service.
#[derive(Clone)]
pub struct TrustEdgeService {
    ctx: ServiceContext,
    registry: RegistryService,
}

impl TrustEdgeService {
    /// Create a new trust edge service.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            ctx,
        }
    }

    /// Add an edge, or update its payload if one already exists.
    #[tracing::instrument(skip(self, actor, input), fields(actor = %actor.domain))]
    pub async fn add(
        &self,
        actor: &instance::Model,
        kind: EdgeKind,
        target_domain: &str,
        input: EdgeInput,
    ) -> AppResult<Mutation> {
        let target_domain = normalize_domain(target_domain)?;
        if target_domain == actor.domain {
            return Err(AppError::BadRequest(format!("You cannot {} yourself.", kind.verb())));
        }
        let (reason, evidence) = input.clean(kind);
        let settings = &self.ctx.settings;

        // nothing is probed or stored for an actor the gate turns away
        gate_actor(self.ctx.db.as_ref(), settings, actor, TrustAction::AddEdge(kind)).await?;
        let target = self
            .registry
            .ensure_registered(&target_domain, kind != EdgeKind::Endorsement)
            .await?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let tree = gate_actor(&txn, settings, actor, TrustAction::AddEdge(kind)).await?;
        let edges = TrustEdgeRepository::new(&txn);

        let mut conflict = None;
        for other in kind.conflicting() {
            if edges.exists(*other, actor.id, target.id).await? {
                conflict = Some(*other);
                break;
            }
        }
        ActionGate::check_mutual_exclusion(kind, conflict)?;

        if kind == EdgeKind::Endorsement && !tree.has_guarantor(target.id) {
            return Err(AppError::Forbidden(
                "Not allowed to endorse non-guaranteed instances.".to_string(),
            ));
        }

        let mut notify_endorsed = false;
        let mutation = match edges.find(kind, actor.id, target.id).await? {
            Some(edge) if edge.same_payload(reason.as_deref(), evidence.as_deref()) => {
                return Ok(Mutation::Unchanged);
            }
            Some(edge) => {
                edges.update_payload(kind, edge.id, reason, evidence).await?;
                record_edge_report(&txn, actor, kind, &target.domain, ReportActivity::Modified)
                    .await?;
                Mutation::Modified
            }
            None => {
                let given = edges.count_by_source(kind, actor.id).await?;
                ActionGate::check_list_size(kind, given + 1, actor.max_list_size)?;
                if kind == EdgeKind::Endorsement {
                    let since = ago(settings.trust.endorsement_notify_quiet_secs);
                    notify_endorsed = !edges.received_since(kind, target.id, since).await?;
                }
                edges.create(kind, actor.id, target.id, reason, evidence).await?;
                record_edge_report(&txn, actor, kind, &target.domain, ReportActivity::Added)
                    .await?;
                Mutation::Created
            }
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(kind = %kind, domain = %target.domain, mutation = ?mutation, "Edge saved");

        if notify_endorsed {
            self.notify(
                &target.domain,
                &format!("Your instance has just been endorsed by {}.", actor.domain),
            )
            .await;
        }
        Ok(mutation)
    }

    /// Change the payload of an existing edge.
    #[tracing::instrument(skip(self, actor, input), fields(actor = %actor.domain))]
    pub async fn modify(
        &self,
        actor: &instance::Model,
        kind: EdgeKind,
        target_domain: &str,
        input: EdgeInput,
    ) -> AppResult<Mutation> {
        let target_domain = normalize_domain(target_domain)?;
        if target_domain == actor.domain {
            return Err(AppError::BadRequest(format!("You cannot {} yourself.", kind.verb())));
        }
        let (reason, evidence) = input.clean(kind);

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        gate_actor(&txn, &self.ctx.settings, actor, TrustAction::ModifyEdge(kind)).await?;
        let target = InstanceRepository::new(&txn)
            .get_by_domain(&target_domain)
            .await?;
        let edges = TrustEdgeRepository::new(&txn);
        let edge = edges
            .find(kind, actor.id, target.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No {kind} found for {}", target.domain)))?;

        if edge.same_payload(reason.as_deref(), evidence.as_deref()) {
            return Ok(Mutation::Unchanged);
        }
        edges.update_payload(kind, edge.id, reason, evidence).await?;
        record_edge_report(&txn, actor, kind, &target.domain, ReportActivity::Modified).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(kind = %kind, domain = %target.domain, "Edge modified");
        Ok(Mutation::Modified)
    }

    /// Remove an edge. Missing edges are not an error.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.domain))]
    pub async fn remove(
        &self,
        actor: &instance::Model,
        kind: EdgeKind,
        target_domain: &str,
    ) -> AppResult<Mutation> {
        let target_domain = normalize_domain(target_domain)?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        gate_actor(&txn, &self.ctx.settings, actor, TrustAction::RemoveEdge(kind)).await?;
        let Some(target) = InstanceRepository::new(&txn)
            .find_by_domain(&target_domain)
            .await?
        else {
            return Ok(Mutation::Unchanged);
        };
        let edges = TrustEdgeRepository::new(&txn);
        let Some(edge) = edges.find(kind, actor.id, target.id).await? else {
            return Ok(Mutation::Unchanged);
        };
        edges.delete(kind, edge.id).await?;
        record_edge_report(&txn, actor, kind, &target.domain, ReportActivity::Deleted).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(kind = %kind, domain = %target.domain, "Edge removed");

        if kind == EdgeKind::Endorsement {
            self.notify(
                &target.domain,
                &format!("Your instance has just been withdrawn an endorsement by {}.", actor.domain),
            )
            .await;
        }
        Ok(Mutation::Deleted)
    }

    /// Apply a whole list of edges at once.
    ///
    /// Individual entries that cannot be applied are skipped. The resulting
    /// list size is checked before anything is written.
    #[tracing::instrument(skip(self, actor, request), fields(actor = %actor.domain, entries = request.entries.len()))]
    pub async fn batch(
        &self,
        actor: &instance::Model,
        kind: EdgeKind,
        request: BatchRequest,
    ) -> AppResult<BatchOutcome> {
        if request.entries.is_empty() && !request.delete {
            return Err(AppError::BadRequest(format!(
                "No {}s provided. Set delete to clear the list.",
                kind.noun()
            )));
        }

        let entries: Vec<BatchEntry> = request
            .entries
            .into_iter()
            .map(|e| {
                let input = EdgeInput {
                    reason: e.reason,
                    evidence: e.evidence,
                };
                let (reason, evidence) = input.clean(kind);
                BatchEntry {
                    domain: normalize_domain(&e.domain).unwrap_or(e.domain),
                    reason,
                    evidence,
                }
            })
            .collect();

        gate_actor(self.ctx.db.as_ref(), &self.ctx.settings, actor, TrustAction::AddEdge(kind))
            .await?;

        // resolve targets before the transaction opens
        let mut targets: HashMap<String, i32> = HashMap::new();
        for entry in &entries {
            if entry.domain == actor.domain || targets.contains_key(&entry.domain) {
                continue;
            }
            match self
                .registry
                .resolve(&entry.domain, kind != EdgeKind::Endorsement)
                .await
            {
                Ok(target) => {
                    targets.insert(entry.domain.clone(), target.id);
                }
                Err(e) => {
                    tracing::debug!(domain = %entry.domain, error = %e, "Skipping unresolvable batch target");
                }
            }
        }

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let tree = gate_actor(&txn, &self.ctx.settings, actor, TrustAction::AddEdge(kind)).await?;
        let edges = TrustEdgeRepository::new(&txn);
        let existing = edges.find_by_sources(kind, &[actor.id]).await?;

        let mut conflicting = HashSet::new();
        for other in kind.conflicting() {
            conflicting.extend(
                edges
                    .find_by_sources(*other, &[actor.id])
                    .await?
                    .into_iter()
                    .map(|e| e.target_id),
            );
        }
        let ineligible: HashSet<i32> = if kind == EdgeKind::Endorsement {
            targets
                .values()
                .copied()
                .filter(|id| !tree.has_guarantor(*id))
                .collect()
        } else {
            HashSet::new()
        };

        let plan = batch::plan(
            &BatchContext {
                source_id: actor.id,
                source_domain: &actor.domain,
                existing: &existing,
                targets: &targets,
                conflicting: &conflicting,
                ineligible: &ineligible,
                delete: request.delete,
                overwrite: request.overwrite,
            },
            entries,
        );
        ActionGate::check_list_size(kind, plan.resulting_count(), actor.max_list_size)?;

        let outcome = BatchOutcome::from(&plan);
        if plan.is_noop() {
            return Ok(outcome);
        }

        for planned in plan.create {
            edges
                .create(kind, actor.id, planned.target_id, planned.reason, planned.evidence)
                .await?;
        }
        for planned in plan.modify {
            edges
                .update_payload(kind, planned.edge_id, planned.reason, planned.evidence)
                .await?;
        }
        edges.delete_many(kind, &plan.delete).await?;

        let reports = ReportRepository::new(&txn);
        for (count, activity) in [
            (outcome.added, ReportActivity::Added),
            (outcome.modified, ReportActivity::Modified),
            (outcome.deleted, ReportActivity::Deleted),
        ] {
            if count > 0 {
                reports
                    .record(&actor.domain, MULTIPLE_TARGETS, kind.report_type(), activity)
                    .await?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(
            kind = %kind,
            added = outcome.added,
            modified = outcome.modified,
            deleted = outcome.deleted,
            skipped = plan.skipped.len(),
            "Batch applied"
        );
        Ok(outcome)
    }

    async fn notify(&self, domain: &str, message: &str) {
        if let Err(e) = self.ctx.notifier.notify(domain, message).await {
            tracing::warn!(domain = %domain, error = %e, "Failed to send notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        probe::test_support::StaticProbe,
        test_support::{context, instance_model},
    };
    use fediseer_db::entities::{censure, guarantee, instance_flag};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn guarantee_model(id: i32, guarantor_id: i32, guaranteed_id: i32) -> guarantee::Model {
        guarantee::Model {
            id,
            guarantor_id,
            guaranteed_id,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn report_model(id: i32) -> fediseer_db::entities::report::Model {
        fediseer_db::entities::report::Model {
            id,
            source_domain: "a.example".to_string(),
            target_domain: MULTIPLE_TARGETS.to_string(),
            report_type: fediseer_db::entities::report::ReportType::Hesitation,
            report_activity: ReportActivity::Added,
            created_at: chrono::Utc::now().into(),
        }
    }

    /// Queries of a passing gate for instance 1.
    fn with_gate(db: MockDatabase) -> MockDatabase {
        db.append_query_results([[guarantee_model(1, 0, 0), guarantee_model(2, 0, 1)]])
            .append_query_results([Vec::<instance_flag::Model>::new()])
            .append_query_results([[count_row(0)]])
    }

    /// Gate, registration lookup, then the gate again inside the transaction.
    fn gated_db(target: instance::Model) -> MockDatabase {
        with_gate(
            with_gate(MockDatabase::new(DatabaseBackend::Postgres)).append_query_results([[target]]),
        )
    }

    #[tokio::test]
    async fn test_add_self_rejected() {
        let service = TrustEdgeService::new(context(
            MockDatabase::new(DatabaseBackend::Postgres),
            StaticProbe::default(),
        ));
        let actor = instance_model(1, "a.example");

        let result = service
            .add(&actor, EdgeKind::Censure, "a.example", EdgeInput::default())
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_endorse_after_censure_rejected() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let db = gated_db(target).append_query_results([[censure::Model {
            id: 5,
            source_id: 1,
            target_id: 2,
            reason: Some("spam".to_string()),
            evidence: None,
            created_at: chrono::Utc::now().into(),
        }]]);
        let service = TrustEdgeService::new(context(
            db,
            StaticProbe::with("b.example", "mastodon", &[]),
        ));

        let result = service
            .add(&actor, EdgeKind::Endorsement, "b.example", EdgeInput::default())
            .await;

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("censure")),
            other => panic!("Expected BadRequest error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_identical_edge_is_unchanged() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let existing = censure::Model {
            id: 5,
            source_id: 1,
            target_id: 2,
            reason: Some("spam".to_string()),
            evidence: None,
            created_at: chrono::Utc::now().into(),
        };
        let db = gated_db(target)
            // no endorsement conflict
            .append_query_results([Vec::<fediseer_db::entities::endorsement::Model>::new()])
            .append_query_results([[existing]]);
        let service = TrustEdgeService::new(context(
            db,
            StaticProbe::with("b.example", "mastodon", &[]),
        ));

        let result = service
            .add(
                &actor,
                EdgeKind::Censure,
                "b.example",
                EdgeInput {
                    reason: Some("  spam ".to_string()),
                    evidence: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(result, Mutation::Unchanged);
    }

    #[tokio::test]
    async fn test_unguaranteed_actor_never_registers_target() {
        let actor = instance_model(1, "a.example");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // guarantee tree: only the root
            .append_query_results([[guarantee_model(1, 0, 0)]])
            .append_query_results([Vec::<instance_flag::Model>::new()])
            .append_query_results([[count_row(0)]]);
        let probe = StaticProbe::with("new.example", "mastodon", &[]);
        let calls = probe.calls.clone();
        let service = TrustEdgeService::new(context(db, probe));

        let result = service
            .add(&actor, EdgeKind::Censure, "new.example", EdgeInput::default())
            .await;

        match result {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("Only guaranteed instances")),
            other => panic!("Expected Forbidden error, got {other:?}"),
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unguaranteed_batch_resolves_nothing() {
        let actor = instance_model(1, "a.example");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[guarantee_model(1, 0, 0)]])
            .append_query_results([Vec::<instance_flag::Model>::new()])
            .append_query_results([[count_row(0)]]);
        let probe = StaticProbe::with("new.example", "mastodon", &[]);
        let calls = probe.calls.clone();
        let service = TrustEdgeService::new(context(db, probe));

        let result = service
            .batch(
                &actor,
                EdgeKind::Hesitation,
                BatchRequest {
                    entries: vec![BatchEntry {
                        domain: "new.example".to_string(),
                        reason: None,
                        evidence: None,
                    }],
                    ..BatchRequest::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_applies_new_entries() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let created = fediseer_db::entities::hesitation::Model {
            id: 7,
            source_id: 1,
            target_id: 2,
            reason: Some("spam".to_string()),
            evidence: None,
            created_at: chrono::Utc::now().into(),
        };
        let db = with_gate(
            with_gate(MockDatabase::new(DatabaseBackend::Postgres))
                // target already registered
                .append_query_results([[target]]),
        )
        // existing hesitations
            .append_query_results([Vec::<fediseer_db::entities::hesitation::Model>::new()])
            // conflicting endorsements
            .append_query_results([Vec::<fediseer_db::entities::endorsement::Model>::new()])
            .append_query_results([[created]])
            .append_query_results([[report_model(1)]]);
        let probe = StaticProbe::default();
        let calls = probe.calls.clone();
        let service = TrustEdgeService::new(context(db, probe));

        let outcome = service
            .batch(
                &actor,
                EdgeKind::Hesitation,
                BatchRequest {
                    entries: vec![
                        BatchEntry {
                            domain: "B.example".to_string(),
                            reason: Some("spam".to_string()),
                            evidence: None,
                        },
                        BatchEntry {
                            domain: "a.example".to_string(),
                            reason: None,
                            evidence: None,
                        },
                    ],
                    ..BatchRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.modified, 0);
        assert_eq!(outcome.deleted, 0);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_without_delete_rejected() {
        let service = TrustEdgeService::new(context(
            MockDatabase::new(DatabaseBackend::Postgres),
            StaticProbe::default(),
        ));
        let actor = instance_model(1, "a.example");

        let result = service
            .batch(&actor, EdgeKind::Hesitation, BatchRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_endorsement_input_drops_evidence() {
        let input = EdgeInput {
            reason: Some("friendly\u{0007}".to_string()),
            evidence: Some("https://evidence.example".to_string()),
        };

        assert_eq!(
            input.clean(EdgeKind::Endorsement),
            (Some("friendly".to_string()), None)
        );
        assert_eq!(
            input.clean(EdgeKind::Censure).1.as_deref(),
            Some("https://evidence.example")
        );
    }
}
