//! Guarantee service: growing and pruning the guarantee tree.

use fediseer_common::{AppError, AppResult, normalize_domain};
use fediseer_db::{
    entities::{
        instance,
        report::{ReportActivity, ReportType},
    },
    repositories::{
        EdgeKind, GuaranteeRepository, InstanceRepository, RejectionRepository, ReportRepository,
        SolicitationRepository, TrustEdgeRepository,
    },
};
use sea_orm::TransactionTrait;

use super::{
    context::{Mutation, ServiceContext, gate_actor, record_edge_report},
    notifier::notify_all,
    registry::RegistryService,
};
use crate::{gate::TrustAction, settings::ago};

/// Guarantee service.
#[derive(Clone)]
pub struct GuaranteeService {
    ctx: ServiceContext,
    registry: RegistryService,
}

impl GuaranteeService {
    /// Create a new guarantee service.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            ctx,
        }
    }

    /// `actor` guarantees `target_domain`.
    ///
    /// Also endorses the target, clears its solicitations and repairs the
    /// orphan marker on the whole subtree.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.domain))]
    pub async fn guarantee(
        &self,
        actor: &instance::Model,
        target_domain: &str,
    ) -> AppResult<Mutation> {
        let target_domain = normalize_domain(target_domain)?;
        if target_domain == actor.domain {
            return Err(AppError::BadRequest(
                "You cannot guarantee yourself.".to_string(),
            ));
        }
        let settings = &self.ctx.settings;
        gate_actor(self.ctx.db.as_ref(), settings, actor, TrustAction::Guarantee).await?;
        let target = self.registry.ensure_registered(&target_domain, false).await?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut tree = gate_actor(&txn, settings, actor, TrustAction::Guarantee).await?;

        match tree.guarantor_of(target.id) {
            Some(existing) if existing == actor.id => return Ok(Mutation::Unchanged),
            Some(_) => {
                return Err(AppError::Forbidden(format!(
                    "{} already has a guarantor. They need to withdraw their guarantee first.",
                    target.domain
                )));
            }
            None => {}
        }

        let guarantees = GuaranteeRepository::new(&txn);
        if !settings.is_root(actor.id) {
            let given = guarantees.count_by_guarantor(actor.id).await?;
            if given >= settings.trust.guarantee_cap {
                return Err(AppError::BadRequest(format!(
                    "You cannot guarantee more than {} instances.",
                    settings.trust.guarantee_cap
                )));
            }
        }

        let edges = TrustEdgeRepository::new(&txn);
        for kind in EdgeKind::Endorsement.conflicting() {
            if edges.exists(*kind, actor.id, target.id).await? {
                return Err(AppError::BadRequest(format!(
                    "You cannot guarantee an instance you have a {kind} against. Withdraw the {kind} first."
                )));
            }
        }

        guarantees.create(actor.id, target.id).await?;
        tree.attach(actor.id, target.id);

        let endorsed = if edges
            .exists(EdgeKind::Endorsement, actor.id, target.id)
            .await?
        {
            false
        } else {
            edges
                .create(EdgeKind::Endorsement, actor.id, target.id, None, None)
                .await?;
            true
        };

        SolicitationRepository::new(&txn)
            .delete_by_source(target.id)
            .await?;

        let mut subtree = vec![target.id];
        subtree.extend(tree.descendants(target.id));
        let instances = InstanceRepository::new(&txn);
        let repaired: Vec<String> = instances
            .find_by_ids(&subtree)
            .await?
            .into_iter()
            .filter(|i| i.id != target.id && i.orphan_since.is_some())
            .map(|i| i.domain)
            .collect();
        instances.set_orphan_since(&subtree, None).await?;

        ReportRepository::new(&txn)
            .record(
                &actor.domain,
                &target.domain,
                ReportType::Guarantee,
                ReportActivity::Added,
            )
            .await?;
        if endorsed {
            record_edge_report(
                &txn,
                actor,
                EdgeKind::Endorsement,
                &target.domain,
                ReportActivity::Added,
            )
            .await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(domain = %target.domain, repaired = repaired.len(), "Guarantee added");

        let notifier = self.ctx.notifier.as_ref();
        notify_all(
            notifier,
            &[target.domain.clone()],
            &format!(
                "Your instance has been guaranteed by {}. You can now endorse, censure and hesitate other instances.",
                actor.domain
            ),
        )
        .await;
        notify_all(
            notifier,
            &repaired,
            &format!(
                "The chain of trust above your instance was repaired when {} was guaranteed.",
                target.domain
            ),
        )
        .await;

        Ok(Mutation::Created)
    }

    /// Withdraw the guarantee `actor` gave to `target_domain`.
    ///
    /// Naming the actor itself as the target releases the actor from its
    /// own guarantor.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.domain))]
    pub async fn withdraw(
        &self,
        actor: &instance::Model,
        target_domain: &str,
    ) -> AppResult<Mutation> {
        let target_domain = normalize_domain(target_domain)?;
        let settings = &self.ctx.settings;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let instances = InstanceRepository::new(&txn);
        let target = instances.get_by_domain(&target_domain).await?;
        if settings.is_root(target.id) {
            return Err(AppError::BadRequest(
                "The root instance cannot lose its guarantee.".to_string(),
            ));
        }

        let mut tree = gate_actor(&txn, settings, actor, TrustAction::WithdrawGuarantee).await?;

        let rejector_id = if target.id == actor.id {
            match tree.guarantor_of(actor.id) {
                Some(guarantor) => guarantor,
                None => return Ok(Mutation::Unchanged),
            }
        } else {
            actor.id
        };

        let rejections = RejectionRepository::new(&txn);
        if let Some(record) = rejections.find_by_pair(rejector_id, target.id).await?
            && record.performed > ago(settings.trust.withdraw_cooldown_secs)
        {
            return Err(AppError::Forbidden(format!(
                "You cannot withdraw a guarantee from {} more than once per day.",
                target.domain
            )));
        }

        let guarantees = GuaranteeRepository::new(&txn);
        let Some(guarantee) = guarantees.find_by_guaranteed(target.id).await? else {
            return Ok(Mutation::Unchanged);
        };
        if guarantee.guarantor_id != rejector_id {
            return Ok(Mutation::Unchanged);
        }
        guarantees.delete(guarantee).await?;
        tree.detach(target.id);

        let edges = TrustEdgeRepository::new(&txn);
        if let Some(endorsement) = edges
            .find(EdgeKind::Endorsement, rejector_id, target.id)
            .await?
        {
            edges.delete(EdgeKind::Endorsement, endorsement.id).await?;
        }

        let now = chrono::Utc::now().fixed_offset();
        rejections.touch(rejector_id, target.id, now).await?;

        let descendants = tree.descendants(target.id);
        let mut subtree = vec![target.id];
        subtree.extend(descendants.iter().copied());
        instances.set_orphan_since(&subtree, Some(now)).await?;

        let solicitations = SolicitationRepository::new(&txn);
        if solicitations.find_by_pair(target.id, None).await?.is_none() {
            solicitations.create(target.id, None, None).await?;
        }

        ReportRepository::new(&txn)
            .record(
                &actor.domain,
                &target.domain,
                ReportType::Guarantee,
                ReportActivity::Deleted,
            )
            .await?;

        let orphaned: Vec<String> = instances
            .find_by_ids(&descendants)
            .await?
            .into_iter()
            .map(|i| i.domain)
            .collect();

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(domain = %target.domain, orphaned = orphaned.len(), "Guarantee withdrawn");

        let notifier = self.ctx.notifier.as_ref();
        notify_all(
            notifier,
            &[target.domain.clone()],
            "Your instance has lost its guarantee. An open solicitation for a new guarantor has been filed.",
        )
        .await;
        notify_all(
            notifier,
            &orphaned,
            &format!(
                "The chain of trust above your instance was broken at {}. Your instance is orphaned until it is repaired.",
                target.domain
            ),
        )
        .await;

        Ok(Mutation::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        notifier::test_support::RecordingNotifier,
        probe::test_support::StaticProbe,
        test_support::{context, context_with, executed_sql, instance_model, ran},
    };
    use fediseer_db::entities::{
        censure, endorsement, guarantee, hesitation, instance_flag, rejection, report,
        solicitation,
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::{Arc, atomic::Ordering};

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

    /// Queries of a passing gate over `tree`.
    fn with_gate(db: MockDatabase, tree: &[guarantee::Model]) -> MockDatabase {
        db.append_query_results([tree.to_vec()])
            .append_query_results([Vec::<instance_flag::Model>::new()])
            .append_query_results([[count_row(0)]])
    }

    #[tokio::test]
    async fn test_guarantee_self_rejected() {
        let service = GuaranteeService::new(context(
            MockDatabase::new(DatabaseBackend::Postgres),
            StaticProbe::default(),
        ));
        let actor = instance_model(1, "a.example");

        let result = service.guarantee(&actor, "A.example").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unguaranteed_actor_cannot_guarantee() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // guarantee tree: only the root
            .append_query_results([[guarantee_model(1, 0, 0)]])
            // restriction flag
            .append_query_results([Vec::<instance_flag::Model>::new()])
            // recent reports
            .append_query_results([[count_row(0)]]);
        let probe = StaticProbe::with("b.example", "mastodon", &[]);
        let calls = probe.calls.clone();
        let service = GuaranteeService::new(context(db, probe));

        let result = service.guarantee(&actor, "b.example").await;

        match result {
            Err(AppError::Forbidden(msg)) => {
                assert!(msg.contains("Only guaranteed instances can guarantee others."));
            }
            other => panic!("Expected Forbidden error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_guarantee_already_held_is_unchanged() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let tree = [
            guarantee_model(1, 0, 0),
            guarantee_model(2, 0, 1),
            guarantee_model(3, 1, 2),
        ];
        let db = with_gate(
            with_gate(MockDatabase::new(DatabaseBackend::Postgres), &tree)
                .append_query_results([[target]]),
            &tree,
        );
        let service = GuaranteeService::new(context(
            db,
            StaticProbe::with("b.example", "mastodon", &[]),
        ));

        let result = service.guarantee(&actor, "b.example").await.unwrap();

        assert_eq!(result, Mutation::Unchanged);
    }

    #[tokio::test]
    async fn test_second_guarantor_forbidden() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(3, "c.example");
        let tree = [
            guarantee_model(1, 0, 0),
            guarantee_model(2, 0, 1),
            guarantee_model(3, 0, 3),
        ];
        let db = with_gate(
            with_gate(MockDatabase::new(DatabaseBackend::Postgres), &tree)
                .append_query_results([[target]]),
            &tree,
        );
        let service = GuaranteeService::new(context(
            db,
            StaticProbe::with("c.example", "mastodon", &[]),
        ));

        let result = service.guarantee(&actor, "c.example").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_withdraw_within_cooldown_forbidden() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let db = with_gate(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[target]]),
            &[guarantee_model(1, 0, 0), guarantee_model(2, 0, 1)],
        )
        .append_query_results([[rejection::Model {
            id: 1,
            rejector_id: 1,
            rejected_id: 2,
            performed: chrono::Utc::now().into(),
        }]]);
        let service = GuaranteeService::new(context(db, StaticProbe::default()));

        let result = service.withdraw(&actor, "b.example").await;

        match result {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("once per day")),
            other => panic!("Expected Forbidden error, got {other:?}"),
        }
    }

    fn endorsement_model(id: i32, source_id: i32, target_id: i32) -> endorsement::Model {
        endorsement::Model {
            id,
            source_id,
            target_id,
            reason: None,
            evidence: None,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn report_model(report_type: ReportType, activity: ReportActivity) -> report::Model {
        report::Model {
            id: 1,
            source_domain: "a.example".to_string(),
            target_domain: "b.example".to_string(),
            report_type,
            report_activity: activity,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_guarantee_endorses_and_repairs_subtree() {
        let actor = instance_model(1, "a.example");
        let mut target = instance_model(2, "b.example");
        target.orphan_since = Some(chrono::Utc::now().into());
        let mut below = instance_model(3, "c.example");
        below.orphan_since = Some(chrono::Utc::now().into());
        // b.example lost its guarantor but still guarantees c.example
        let tree = [
            guarantee_model(1, 0, 0),
            guarantee_model(2, 0, 1),
            guarantee_model(4, 2, 3),
        ];
        let db = with_gate(
            with_gate(MockDatabase::new(DatabaseBackend::Postgres), &tree)
                .append_query_results([[target.clone()]]),
            &tree,
        )
        .append_query_results([[count_row(0)]])
        // no censure or hesitation against the target
        .append_query_results([Vec::<censure::Model>::new()])
        .append_query_results([Vec::<hesitation::Model>::new()])
        .append_query_results([[guarantee_model(5, 1, 2)]])
        // no endorsement yet, then the created one
        .append_query_results([Vec::<endorsement::Model>::new()])
        .append_query_results([[endorsement_model(6, 1, 2)]])
        .append_exec_results([exec(1)])
        .append_query_results([[target, below]])
        .append_exec_results([exec(2)])
        .append_query_results([[report_model(ReportType::Guarantee, ReportActivity::Added)]])
        .append_query_results([[report_model(ReportType::Endorsement, ReportActivity::Added)]]);
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context_with(
            db,
            StaticProbe::with("b.example", "mastodon", &[]),
            notifier.clone(),
        );
        let service = GuaranteeService::new(ctx.clone());

        let result = service.guarantee(&actor, "b.example").await.unwrap();
        drop(service);

        assert_eq!(result, Mutation::Created);
        let sql = executed_sql(ctx);
        assert!(ran(&sql, r#"INSERT INTO "guarantee""#));
        assert!(ran(&sql, r#"INSERT INTO "endorsement""#));
        assert!(ran(&sql, r#"DELETE FROM "solicitation""#));
        assert!(ran(&sql, r#"UPDATE "instance" SET "orphan_since""#));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "b.example");
        assert!(sent[0].1.contains("guaranteed by a.example"));
        assert_eq!(sent[1].0, "c.example");
        assert!(sent[1].1.contains("repaired"));
    }

    #[tokio::test]
    async fn test_withdraw_orphans_subtree_and_solicits() {
        let actor = instance_model(1, "a.example");
        let target = instance_model(2, "b.example");
        let below = instance_model(3, "c.example");
        let stale = rejection::Model {
            id: 1,
            rejector_id: 1,
            rejected_id: 2,
            performed: (chrono::Utc::now() - chrono::Duration::days(2)).into(),
        };
        let db = with_gate(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[target]]),
            &[
                guarantee_model(1, 0, 0),
                guarantee_model(2, 0, 1),
                guarantee_model(3, 1, 2),
                guarantee_model(4, 2, 3),
            ],
        )
        // last withdrawal is outside the cooldown
        .append_query_results([[stale.clone()]])
        .append_query_results([[guarantee_model(3, 1, 2)]])
        .append_exec_results([exec(1)])
        .append_query_results([[endorsement_model(6, 1, 2)]])
        .append_exec_results([exec(1)])
        // rejection refresh
        .append_query_results([[stale.clone()]])
        .append_query_results([[rejection::Model {
            performed: chrono::Utc::now().into(),
            ..stale
        }]])
        .append_exec_results([exec(2)])
        .append_query_results([Vec::<solicitation::Model>::new()])
        .append_query_results([[solicitation::Model {
            id: 8,
            source_id: 2,
            target_id: None,
            comment: None,
            created_at: chrono::Utc::now().into(),
        }]])
        .append_query_results([[report_model(ReportType::Guarantee, ReportActivity::Deleted)]])
        .append_query_results([[below]]);
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context_with(db, StaticProbe::default(), notifier.clone());
        let service = GuaranteeService::new(ctx.clone());

        let result = service.withdraw(&actor, "b.example").await.unwrap();
        drop(service);

        assert_eq!(result, Mutation::Deleted);
        let sql = executed_sql(ctx);
        assert!(ran(&sql, r#"DELETE FROM "guarantee""#));
        assert!(ran(&sql, r#"DELETE FROM "endorsement""#));
        assert!(ran(&sql, r#"UPDATE "rejection""#));
        assert!(ran(&sql, r#"UPDATE "instance" SET "orphan_since""#));
        assert!(ran(&sql, r#"INSERT INTO "solicitation""#));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "b.example");
        assert_eq!(sent[1].0, "c.example");
        assert!(sent[1].1.contains("broken at b.example"));
    }

    #[tokio::test]
    async fn test_withdraw_root_rejected() {
        let actor = instance_model(1, "a.example");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(0, "fediseer.example")]]);
        let service = GuaranteeService::new(context(db, StaticProbe::default()));

        let result = service.withdraw(&actor, "fediseer.example").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
