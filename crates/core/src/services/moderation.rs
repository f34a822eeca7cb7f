//! Operator moderation flags.
//!
//! Only the root instance may flag. A RESTRICTED instance is always MUTED as
//! well, and both flags pin the instance's list visibilities to PRIVATE.

use fediseer_common::{AppError, AppResult, normalize_domain, sanitize_text};
use fediseer_db::{
    entities::{
        instance::{self, ListVisibility},
        instance_flag::FlagKind,
        report::{ReportActivity, ReportType},
    },
    repositories::{FlagRepository, InstanceRepository, ReportRepository},
};
use sea_orm::{ConnectionTrait, IntoActiveModel, Set, TransactionTrait};

use super::context::{Mutation, ServiceContext};

/// Moderation service.
#[derive(Clone)]
pub struct ModerationService {
    ctx: ServiceContext,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Flag `target_domain`.
    #[tracing::instrument(skip(self, actor, comment), fields(actor = %actor.domain))]
    pub async fn add_flag(
        &self,
        actor: &instance::Model,
        target_domain: &str,
        flag: FlagKind,
        comment: Option<&str>,
    ) -> AppResult<Mutation> {
        let comment = sanitize_text(comment, None);
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let target = self.target(&txn, actor, target_domain).await?;

        let flags = FlagRepository::new(&txn);
        let mutation = match flags.find(target.id, flag).await? {
            Some(existing) if existing.comment == comment => return Ok(Mutation::Unchanged),
            Some(existing) => {
                flags.update_comment(existing, comment).await?;
                record(&txn, actor, &target, ReportActivity::Modified).await?;
                Mutation::Modified
            }
            None => {
                flags.create(target.id, flag, comment.clone()).await?;
                if flag == FlagKind::Restricted && !flags.has_flag(target.id, FlagKind::Muted).await? {
                    flags.create(target.id, FlagKind::Muted, comment).await?;
                }
                pin_private(&txn, target.clone()).await?;
                record(&txn, actor, &target, ReportActivity::Added).await?;
                Mutation::Created
            }
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(domain = %target.domain, flag = ?flag, mutation = ?mutation, "Flag saved");
        Ok(mutation)
    }

    /// Change the comment on an existing flag.
    #[tracing::instrument(skip(self, actor, comment), fields(actor = %actor.domain))]
    pub async fn modify_flag(
        &self,
        actor: &instance::Model,
        target_domain: &str,
        flag: FlagKind,
        comment: Option<&str>,
    ) -> AppResult<Mutation> {
        let comment = sanitize_text(comment, None);
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let target = self.target(&txn, actor, target_domain).await?;

        let flags = FlagRepository::new(&txn);
        let existing = flags.find(target.id, flag).await?.ok_or_else(|| {
            AppError::NotFound(format!("{} is not flagged {flag:?}", target.domain))
        })?;
        if existing.comment == comment {
            return Ok(Mutation::Unchanged);
        }
        flags.update_comment(existing, comment).await?;
        record(&txn, actor, &target, ReportActivity::Modified).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(Mutation::Modified)
    }

    /// Remove a flag. Missing flags are not an error.
    ///
    /// Visibilities stay PRIVATE; the instance may reopen them itself.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.domain))]
    pub async fn remove_flag(
        &self,
        actor: &instance::Model,
        target_domain: &str,
        flag: FlagKind,
    ) -> AppResult<Mutation> {
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let target = self.target(&txn, actor, target_domain).await?;

        let flags = FlagRepository::new(&txn);
        let Some(existing) = flags.find(target.id, flag).await? else {
            return Ok(Mutation::Unchanged);
        };
        if flag == FlagKind::Muted && flags.has_flag(target.id, FlagKind::Restricted).await? {
            return Err(AppError::BadRequest(format!(
                "{} is restricted. Remove the RESTRICTED flag first.",
                target.domain
            )));
        }
        flags.delete(existing).await?;
        record(&txn, actor, &target, ReportActivity::Deleted).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(domain = %target.domain, flag = ?flag, "Flag removed");
        Ok(Mutation::Deleted)
    }

    async fn target<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &instance::Model,
        target_domain: &str,
    ) -> AppResult<instance::Model> {
        if !self.ctx.settings.is_root(actor.id) {
            return Err(AppError::Forbidden(
                "Only the root instance can flag instances.".to_string(),
            ));
        }
        let target_domain = normalize_domain(target_domain)?;
        if target_domain == actor.domain {
            return Err(AppError::BadRequest("You cannot flag yourself.".to_string()));
        }
        InstanceRepository::new(conn).get_by_domain(&target_domain).await
    }
}

async fn pin_private<C: ConnectionTrait>(conn: &C, target: instance::Model) -> AppResult<()> {
    let mut active = target.into_active_model();
    active.visibility_endorsements = Set(ListVisibility::Private);
    active.visibility_censures = Set(ListVisibility::Private);
    active.visibility_hesitations = Set(ListVisibility::Private);
    active.updated_at = Set(Some(chrono::Utc::now().fixed_offset()));
    InstanceRepository::new(conn).update(active).await?;
    Ok(())
}

async fn record<C: ConnectionTrait>(
    conn: &C,
    actor: &instance::Model,
    target: &instance::Model,
    activity: ReportActivity,
) -> AppResult<()> {
    ReportRepository::new(conn)
        .record(&actor.domain, &target.domain, ReportType::Flag, activity)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        probe::test_support::StaticProbe,
        test_support::{context, instance_model},
    };
    use fediseer_db::entities::instance_flag;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_non_root_cannot_flag() {
        let service = ModerationService::new(context(
            MockDatabase::new(DatabaseBackend::Postgres),
            StaticProbe::default(),
        ));
        let actor = instance_model(4, "a.example");

        let result = service
            .add_flag(&actor, "b.example", FlagKind::Muted, None)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_unmute_while_restricted_rejected() {
        let root = instance_model(0, "fediseer.example");
        let target = instance_model(2, "b.example");
        let flag = |id, flag| instance_flag::Model {
            id,
            instance_id: 2,
            flag,
            comment: None,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[target]])
            .append_query_results([[flag(1, FlagKind::Muted)]])
            .append_query_results([[flag(2, FlagKind::Restricted)]]);
        let service = ModerationService::new(context(db, StaticProbe::default()));

        let result = service.remove_flag(&root, "b.example", FlagKind::Muted).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
