//! Instance registry: lazy registration and metadata refresh.

use fediseer_common::{AppResult, normalize_domain};
use fediseer_db::{
    entities::instance::{self, ListVisibility},
    repositories::InstanceRepository,
};
use sea_orm::{IntoActiveModel, Set};
use serde::Serialize;

use super::{
    context::ServiceContext,
    probe::InstanceMetadata,
};

/// Reachability derived from consecutive probe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Up,
    Unreachable,
    Offline,
}

impl InstanceState {
    #[must_use]
    pub const fn from_failures(poll_failures: i32, offline_after: i32) -> Self {
        if poll_failures <= 0 {
            Self::Up
        } else if poll_failures < offline_after {
            Self::Unreachable
        } else {
            Self::Offline
        }
    }
}

fn metadata_differs(model: &instance::Model, meta: &InstanceMetadata) -> bool {
    model.software != meta.software
        || model.open_registrations != meta.open_registrations
        || model.approval_required != meta.approval_required
        || model.email_verify != meta.email_verify
        || model.has_captcha != meta.has_captcha
}

/// Registry service.
#[derive(Clone)]
pub struct RegistryService {
    ctx: ServiceContext,
}

impl RegistryService {
    /// Create a new registry service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn state_of(&self, instance: &instance::Model) -> InstanceState {
        InstanceState::from_failures(instance.poll_failures, self.ctx.settings.trust.offline_after)
    }

    /// Probe `domain` and create or refresh its row.
    ///
    /// When the probe fails the cached row is returned with its failure
    /// counter bumped. Without a cached row the instance is stored as
    /// `unknown` if `allow_unreachable`, otherwise the call fails.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_registered(
        &self,
        domain: &str,
        allow_unreachable: bool,
    ) -> AppResult<instance::Model> {
        let domain = normalize_domain(domain)?;
        let repo = InstanceRepository::new(self.ctx.db.as_ref());
        let cached = repo.find_by_domain(&domain).await?;

        match self.ctx.probe.probe(&domain).await {
            Ok(meta) => match cached {
                Some(model) if !metadata_differs(&model, &meta) && model.poll_failures == 0 => {
                    Ok(model)
                }
                Some(model) => {
                    tracing::debug!(domain = %domain, "Refreshing instance metadata");
                    let mut active = model.into_active_model();
                    active.software = Set(meta.software);
                    active.open_registrations = Set(meta.open_registrations);
                    active.approval_required = Set(meta.approval_required);
                    active.email_verify = Set(meta.email_verify);
                    active.has_captcha = Set(meta.has_captcha);
                    active.poll_failures = Set(0);
                    active.updated_at = Set(Some(chrono::Utc::now().fixed_offset()));
                    repo.update(active).await
                }
                None => self.create(&domain, meta, 0).await,
            },
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "Instance probe failed");
                match cached {
                    Some(model) => {
                        let failures = model.poll_failures.saturating_add(1);
                        let mut active = model.into_active_model();
                        active.poll_failures = Set(failures);
                        repo.update(active).await
                    }
                    None if allow_unreachable => {
                        self.create(&domain, InstanceMetadata::unknown(), 1).await
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    /// Return the stored row, registering the domain only if unknown.
    pub async fn resolve(
        &self,
        domain: &str,
        allow_unreachable: bool,
    ) -> AppResult<instance::Model> {
        let normalized = normalize_domain(domain)?;
        match InstanceRepository::new(self.ctx.db.as_ref())
            .find_by_domain(&normalized)
            .await?
        {
            Some(model) => Ok(model),
            None => self.ensure_registered(&normalized, allow_unreachable).await,
        }
    }

    async fn create(
        &self,
        domain: &str,
        meta: InstanceMetadata,
        poll_failures: i32,
    ) -> AppResult<instance::Model> {
        let repo = InstanceRepository::new(self.ctx.db.as_ref());
        let model = instance::ActiveModel {
            domain: Set(domain.to_string()),
            software: Set(meta.software),
            open_registrations: Set(meta.open_registrations),
            approval_required: Set(meta.approval_required),
            email_verify: Set(meta.email_verify),
            has_captcha: Set(meta.has_captcha),
            sysadmins: Set(None),
            moderators: Set(None),
            visibility_endorsements: Set(ListVisibility::Open),
            visibility_censures: Set(ListVisibility::Open),
            visibility_hesitations: Set(ListVisibility::Open),
            orphan_since: Set(None),
            poll_failures: Set(poll_failures),
            max_list_size: Set(self.ctx.settings.trust.default_max_list_size),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            updated_at: Set(None),
            ..Default::default()
        };

        match repo.create(model).await {
            Ok(created) => {
                tracing::info!(domain = %domain, software = %created.software, "Instance registered");
                Ok(created)
            }
            // lost a registration race
            Err(e) => repo.find_by_domain(domain).await?.ok_or(e),
        }
    }
}
