//! Instance details as returned to callers.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use fediseer_db::{
    entities::{
        instance::{self, ListVisibility},
        instance_flag::FlagKind,
    },
    repositories::{
        EdgeKind, FlagRepository, InstanceRepository, TagRepository, TrustEdgeRepository,
        UserRepository,
    },
};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use super::registry::InstanceState;
use crate::{graph::GuaranteeTree, settings::TrustSettings};

/// Public description of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceView {
    pub id: i32,
    pub domain: String,
    pub software: String,
    /// Number of admin accounts that claimed the instance.
    pub claimed: usize,
    pub open_registrations: bool,
    pub approval_required: bool,
    pub email_verify: bool,
    pub has_captcha: bool,
    pub sysadmins: Option<i32>,
    pub moderators: Option<i32>,
    pub state: InstanceState,
    pub guarantor: Option<String>,
    /// Endorsements received.
    pub endorsements: usize,
    pub visibility_endorsements: ListVisibility,
    pub visibility_censures: ListVisibility,
    pub visibility_hesitations: ListVisibility,
    pub orphan_since: Option<DateTime<FixedOffset>>,
    pub tags: Vec<String>,
    pub flags: Vec<FlagKind>,
}

/// Build views for `instances`, loading related rows in bulk.
pub(crate) async fn build_views<C: ConnectionTrait>(
    conn: &C,
    settings: &TrustSettings,
    tree: &GuaranteeTree,
    instances: Vec<instance::Model>,
) -> AppResult<Vec<InstanceView>> {
    if instances.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<i32> = instances.iter().map(|i| i.id).collect();

    let mut claims: HashMap<i32, usize> = HashMap::new();
    for claim in UserRepository::new(conn).find_claims_by_instances(&ids).await? {
        *claims.entry(claim.instance_id).or_default() += 1;
    }

    let mut endorsements: HashMap<i32, usize> = HashMap::new();
    for edge in TrustEdgeRepository::new(conn)
        .find_by_targets(EdgeKind::Endorsement, &ids)
        .await?
    {
        *endorsements.entry(edge.target_id).or_default() += 1;
    }

    let mut tags: HashMap<i32, Vec<String>> = HashMap::new();
    for tag in TagRepository::new(conn).find_by_instances(&ids).await? {
        tags.entry(tag.instance_id).or_default().push(tag.tag);
    }

    let mut flags: HashMap<i32, Vec<FlagKind>> = HashMap::new();
    for flag in FlagRepository::new(conn).find_by_instances(&ids).await? {
        flags.entry(flag.instance_id).or_default().push(flag.flag);
    }

    let mut guarantor_ids: Vec<i32> = ids.iter().filter_map(|id| tree.guarantor_of(*id)).collect();
    guarantor_ids.sort_unstable();
    guarantor_ids.dedup();
    let guarantor_domains: HashMap<i32, String> = InstanceRepository::new(conn)
        .find_by_ids(&guarantor_ids)
        .await?
        .into_iter()
        .map(|i| (i.id, i.domain))
        .collect();

    let offline_after = settings.trust.offline_after;
    Ok(instances
        .into_iter()
        .map(|i| InstanceView {
            claimed: claims.get(&i.id).copied().unwrap_or(0),
            state: InstanceState::from_failures(i.poll_failures, offline_after),
            guarantor: tree
                .guarantor_of(i.id)
                .and_then(|g| guarantor_domains.get(&g).cloned()),
            endorsements: endorsements.get(&i.id).copied().unwrap_or(0),
            tags: tags.remove(&i.id).unwrap_or_default(),
            flags: flags.remove(&i.id).unwrap_or_default(),
            id: i.id,
            domain: i.domain,
            software: i.software,
            open_registrations: i.open_registrations,
            approval_required: i.approval_required,
            email_verify: i.email_verify,
            has_captcha: i.has_captcha,
            sysadmins: i.sysadmins,
            moderators: i.moderators,
            visibility_endorsements: i.visibility_endorsements,
            visibility_censures: i.visibility_censures,
            visibility_hesitations: i.visibility_hesitations,
            orphan_since: i.orphan_since,
        })
        .collect())
}

/// Build a single view.
pub(crate) async fn build_view<C: ConnectionTrait>(
    conn: &C,
    settings: &TrustSettings,
    tree: &GuaranteeTree,
    instance: instance::Model,
) -> AppResult<InstanceView> {
    build_views(conn, settings, tree, vec![instance])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Instance view missing".to_string()))
}
