//! Shared service dependencies and the gate lookup.

use std::sync::Arc;

use fediseer_common::AppResult;
use fediseer_db::{
    entities::{
        instance::{self, ListVisibility},
        instance_flag::FlagKind,
        report::ReportActivity,
    },
    repositories::{
        EdgeKind, FlagRepository, GuaranteeRepository, InstanceRepository, REDACTED_TARGET,
        ReportRepository,
    },
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;

use super::{notifier::NotifierService, probe::ProbeService};
use crate::{
    gate::{ActionGate, ActorFacts, TrustAction},
    graph::{ChainStatus, GuaranteeTree},
    settings::TrustSettings,
};

/// Dependencies every trust service needs.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: Arc<DatabaseConnection>,
    pub settings: Arc<TrustSettings>,
    pub notifier: NotifierService,
    pub probe: ProbeService,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        settings: TrustSettings,
        notifier: NotifierService,
        probe: ProbeService,
    ) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            notifier,
            probe,
        }
    }
}

/// What a mutating call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mutation {
    Created,
    Modified,
    Deleted,
    Unchanged,
}

impl Mutation {
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Load the guarantee tree.
pub(crate) async fn load_tree<C: ConnectionTrait>(
    conn: &C,
    settings: &TrustSettings,
) -> AppResult<GuaranteeTree> {
    let guarantees = GuaranteeRepository::new(conn).find_all().await?;
    Ok(GuaranteeTree::from_models(settings.root.id, &guarantees))
}

/// Gather facts about `actor`, run the gate, and hand back the tree.
pub(crate) async fn gate_actor<C: ConnectionTrait>(
    conn: &C,
    settings: &TrustSettings,
    actor: &instance::Model,
    action: TrustAction,
) -> AppResult<GuaranteeTree> {
    let tree = load_tree(conn, settings).await?;
    let chain = tree.chain_of(actor.id);

    let breaker_domain = match chain {
        ChainStatus::Broken { breaker } if breaker == actor.id => Some(actor.domain.clone()),
        ChainStatus::Broken { breaker } => InstanceRepository::new(conn)
            .find_by_id(breaker)
            .await?
            .map(|i| i.domain),
        ChainStatus::Unbroken => None,
    };
    let restricted = FlagRepository::new(conn)
        .has_flag(actor.id, FlagKind::Restricted)
        .await?;
    let recent_actions = ReportRepository::new(conn)
        .count_since(&actor.domain, settings.rate_window_start())
        .await?;

    let facts = ActorFacts {
        domain: actor.domain.clone(),
        has_guarantor: tree.has_guarantor(actor.id),
        chain,
        breaker_domain,
        restricted,
        recent_actions,
    };
    ActionGate::new(settings.rate_limit.max_actions).check(action, &facts)?;

    Ok(tree)
}

/// Audit an edge change, hiding the target unless the actor's list is open.
pub(crate) async fn record_edge_report<C: ConnectionTrait>(
    conn: &C,
    actor: &instance::Model,
    kind: EdgeKind,
    target_domain: &str,
    activity: ReportActivity,
) -> AppResult<()> {
    let target = if kind.visibility_of(actor) == ListVisibility::Open {
        target_domain
    } else {
        REDACTED_TARGET
    };
    ReportRepository::new(conn)
        .record(&actor.domain, target, kind.report_type(), activity)
        .await?;
    Ok(())
}
