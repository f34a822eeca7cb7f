//! Rebuttal service.

use fediseer_common::{AppError, AppResult, normalize_domain, sanitize_text};
use fediseer_db::{
    entities::{
        instance,
        report::{ReportActivity, ReportType},
    },
    repositories::{
        EdgeKind, InstanceRepository, RebuttalRepository, ReportRepository, TrustEdgeRepository,
    },
};
use sea_orm::{ConnectionTrait, TransactionTrait};

use super::context::{Mutation, ServiceContext, gate_actor};
use crate::{gate::TrustAction, visibility::can_view};

/// Rebuttal service.
#[derive(Clone)]
pub struct RebuttalService {
    ctx: ServiceContext,
}

impl RebuttalService {
    /// Create a new rebuttal service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Answer a censure or hesitation `judge_domain` gave the actor.
    #[tracing::instrument(skip(self, actor, text), fields(actor = %actor.domain))]
    pub async fn add(
        &self,
        actor: &instance::Model,
        judge_domain: &str,
        text: &str,
    ) -> AppResult<Mutation> {
        let text = clean(text)?;
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let judge = self.judge(&txn, actor, judge_domain, TrustAction::Rebut).await?;
        require_visible_judgment(&txn, actor, &judge).await?;

        let rebuttals = RebuttalRepository::new(&txn);
        if rebuttals.find_by_pair(actor.id, judge.id).await?.is_some() {
            return Err(AppError::Forbidden(format!(
                "You already rebutted {}. Modify the existing rebuttal instead.",
                judge.domain
            )));
        }
        rebuttals.create(actor.id, judge.id, text).await?;
        record(&txn, actor, &judge, ReportActivity::Added).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(judge = %judge.domain, "Rebuttal added");
        Ok(Mutation::Created)
    }

    /// Replace the text of an existing rebuttal.
    #[tracing::instrument(skip(self, actor, text), fields(actor = %actor.domain))]
    pub async fn modify(
        &self,
        actor: &instance::Model,
        judge_domain: &str,
        text: &str,
    ) -> AppResult<Mutation> {
        let text = clean(text)?;
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let judge = self.judge(&txn, actor, judge_domain, TrustAction::Rebut).await?;
        require_visible_judgment(&txn, actor, &judge).await?;

        let rebuttals = RebuttalRepository::new(&txn);
        let existing = rebuttals
            .find_by_pair(actor.id, judge.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No rebuttal against {} found", judge.domain)))?;
        if existing.rebuttal == text {
            return Ok(Mutation::Unchanged);
        }
        rebuttals.update_text(existing, text).await?;
        record(&txn, actor, &judge, ReportActivity::Modified).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(judge = %judge.domain, "Rebuttal modified");
        Ok(Mutation::Modified)
    }

    /// Delete a rebuttal. Missing rebuttals are not an error.
    ///
    /// Only throttled, so an orphaned or restricted instance can still take
    /// back what it wrote.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.domain))]
    pub async fn remove(&self, actor: &instance::Model, judge_domain: &str) -> AppResult<Mutation> {
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let judge = self
            .judge(&txn, actor, judge_domain, TrustAction::RemoveRebuttal)
            .await?;

        let rebuttals = RebuttalRepository::new(&txn);
        let Some(existing) = rebuttals.find_by_pair(actor.id, judge.id).await? else {
            return Ok(Mutation::Unchanged);
        };
        rebuttals.delete(existing).await?;
        record(&txn, actor, &judge, ReportActivity::Deleted).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(judge = %judge.domain, "Rebuttal removed");
        Ok(Mutation::Deleted)
    }

    /// Resolve the judging instance and run the gate.
    async fn judge<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &instance::Model,
        judge_domain: &str,
        action: TrustAction,
    ) -> AppResult<instance::Model> {
        let judge_domain = normalize_domain(judge_domain)?;
        if judge_domain == actor.domain {
            return Err(AppError::BadRequest("You cannot rebut yourself.".to_string()));
        }
        gate_actor(conn, &self.ctx.settings, actor, action).await?;
        InstanceRepository::new(conn)
            .find_by_domain(&judge_domain)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Instance not registered: {judge_domain}")))
    }
}

fn clean(text: &str) -> AppResult<String> {
    sanitize_text(Some(text), None)
        .ok_or_else(|| AppError::BadRequest("Rebuttal text cannot be empty.".to_string()))
}

/// The judge must hold a censure or hesitation on the actor that the actor
/// is allowed to see.
async fn require_visible_judgment<C: ConnectionTrait>(
    conn: &C,
    actor: &instance::Model,
    judge: &instance::Model,
) -> AppResult<()> {
    let edges = TrustEdgeRepository::new(conn);
    let endorses_judge = edges
        .exists(EdgeKind::Endorsement, actor.id, judge.id)
        .await?;
    for kind in [EdgeKind::Censure, EdgeKind::Hesitation] {
        if edges.exists(kind, judge.id, actor.id).await?
            && can_view(kind.visibility_of(judge), judge.id, Some(actor.id), endorses_judge)
        {
            return Ok(());
        }
    }
    Err(AppError::Forbidden(format!(
        "{} has not censured or hesitated your instance.",
        judge.domain
    )))
}

async fn record<C: ConnectionTrait>(
    conn: &C,
    actor: &instance::Model,
    judge: &instance::Model,
    activity: ReportActivity,
) -> AppResult<()> {
    ReportRepository::new(conn)
        .record(&actor.domain, &judge.domain, ReportType::Rebuttal, activity)
        .await?;
    Ok(())
}
