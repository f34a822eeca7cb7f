//! Solicitation service: requests for a guarantee.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult, normalize_domain, sanitize_text};
use fediseer_db::{
    entities::{
        instance, solicitation,
        report::{ReportActivity, ReportType},
    },
    repositories::{InstanceRepository, ReportRepository, SolicitationRepository},
};
use sea_orm::TransactionTrait;
use serde::Serialize;

use super::{
    context::{ServiceContext, load_tree},
    registry::InstanceState,
};
use crate::{gate::ActionGate, settings::ago};

/// A pending solicitation as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolicitationView {
    pub source_domain: String,
    pub software: String,
    /// `None` for an open call.
    pub target_domain: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

/// Solicitation service.
#[derive(Clone)]
pub struct SolicitationService {
    ctx: ServiceContext,
}

impl SolicitationService {
    /// Create a new solicitation service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// File a solicitation for `actor`, optionally addressed to one guarantor.
    #[tracing::instrument(skip(self, actor, comment), fields(actor = %actor.domain))]
    pub async fn solicit(
        &self,
        actor: &instance::Model,
        guarantor_domain: Option<&str>,
        comment: Option<&str>,
    ) -> AppResult<solicitation::Model> {
        let settings = &self.ctx.settings;
        let comment = sanitize_text(comment, None);
        let guarantor_domain = guarantor_domain.map(normalize_domain).transpose()?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let tree = load_tree(&txn, settings).await?;
        if tree.has_guarantor(actor.id) {
            return Err(AppError::BadRequest(
                "Your instance is already guaranteed.".to_string(),
            ));
        }

        let guarantor = match guarantor_domain {
            Some(domain) => {
                let guarantor = InstanceRepository::new(&txn)
                    .find_by_domain(&domain)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("{domain} is not a known instance."))
                    })?;
                if !tree.chain_of(guarantor.id).is_unbroken() {
                    return Err(AppError::BadRequest(format!(
                        "{domain} is not guaranteed and cannot guarantee others."
                    )));
                }
                Some(guarantor)
            }
            None => None,
        };

        let reports = ReportRepository::new(&txn);
        let recent_actions = reports
            .count_since(&actor.domain, settings.rate_window_start())
            .await?;
        ActionGate::new(settings.rate_limit.max_actions)
            .check_throttle(&actor.domain, recent_actions)?;

        let solicitations = SolicitationRepository::new(&txn);
        if solicitations
            .find_by_pair(actor.id, guarantor.as_ref().map(|g| g.id))
            .await?
            .is_some()
        {
            return Err(AppError::Forbidden(
                "You have already filed this solicitation.".to_string(),
            ));
        }
        if solicitations
            .has_since(actor.id, ago(settings.trust.solicitation_cooldown_secs))
            .await?
        {
            return Err(AppError::Forbidden(
                "You can only solicit a guarantee once per day.".to_string(),
            ));
        }

        let created = solicitations
            .create(actor.id, guarantor.as_ref().map(|g| g.id), comment)
            .await?;
        let report_target = guarantor.as_ref().map_or(actor.domain.as_str(), |g| g.domain.as_str());
        reports
            .record(
                &actor.domain,
                report_target,
                ReportType::Solicitation,
                ReportActivity::Added,
            )
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(guarantor = ?guarantor.as_ref().map(|g| &g.domain), "Solicitation filed");

        if let Some(guarantor) = guarantor
            && let Err(e) = self
                .ctx
                .notifier
                .notify(
                    &guarantor.domain,
                    &format!("{} is asking your instance for a guarantee.", actor.domain),
                )
                .await
        {
            tracing::warn!(domain = %guarantor.domain, error = %e, "Failed to send notification");
        }

        Ok(created)
    }

    /// Pending solicitations, oldest first, skipping offline instances.
    pub async fn list(&self) -> AppResult<Vec<SolicitationView>> {
        let conn = self.ctx.db.as_ref();
        let solicitations = SolicitationRepository::new(conn).find_all().await?;

        let mut ids: Vec<i32> = solicitations
            .iter()
            .flat_map(|s| std::iter::once(s.source_id).chain(s.target_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let instances: HashMap<i32, instance::Model> = InstanceRepository::new(conn)
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        let offline_after = self.ctx.settings.trust.offline_after;
        let views: Vec<SolicitationView> = solicitations
            .into_iter()
            .filter_map(|s| {
                let source = instances.get(&s.source_id)?;
                if InstanceState::from_failures(source.poll_failures, offline_after)
                    == InstanceState::Offline
                {
                    return None;
                }
                Some(SolicitationView {
                    source_domain: source.domain.clone(),
                    software: source.software.clone(),
                    target_domain: s
                        .target_id
                        .and_then(|t| instances.get(&t))
                        .map(|t| t.domain.clone()),
                    comment: s.comment,
                    created_at: s.created_at,
                })
            })
            .collect();

        tracing::debug!(count = views.len(), "Listed solicitations");
        Ok(views)
    }
}
