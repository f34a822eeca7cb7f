//! Trust-graph services.
//!
//! Every mutation opens one transaction, builds repositories over it,
//! commits, and only then notifies.

#![allow(missing_docs)]

pub mod context;
pub mod guarantee;
pub mod identity;
pub mod moderation;
pub mod notifier;
pub mod probe;
pub mod reader;
pub mod rebuttal;
pub mod registry;
pub mod report;
pub mod solicitation;
pub mod tag;
pub mod trust_edge;
pub mod view;

pub use context::{Mutation, ServiceContext};
pub use guarantee::GuaranteeService;
pub use identity::{ClaimOutcome, IdentityService, Principal, SettingsOutcome, SettingsUpdate};
pub use moderation::ModerationService;
pub use notifier::{LoggingNotifier, Notifier, NotifierService};
pub use probe::{InstanceMetadata, MetadataProbe, ProbeError, ProbeService};
pub use reader::{GivenQuery, JudgedInstance, ReaderService, ReceivedEdge, WhitelistFilter};
pub use rebuttal::RebuttalService;
pub use registry::{InstanceState, RegistryService};
pub use report::{REPORTS_PER_PAGE, ReportQuery, ReportService};
pub use solicitation::{SolicitationService, SolicitationView};
pub use tag::TagService;
pub use trust_edge::{BatchRequest, EdgeInput, TrustEdgeService};
pub use view::InstanceView;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use fediseer_db::entities::instance::{self, ListVisibility};
    use sea_orm::MockDatabase;

    use super::{
        context::ServiceContext, notifier::test_support::RecordingNotifier,
        probe::test_support::StaticProbe,
    };
    use crate::settings::test_support::settings;

    pub fn instance_model(id: i32, domain: &str) -> instance::Model {
        instance::Model {
            id,
            domain: domain.to_string(),
            software: "mastodon".to_string(),
            open_registrations: false,
            approval_required: false,
            email_verify: false,
            has_captcha: false,
            sysadmins: None,
            moderators: None,
            visibility_endorsements: ListVisibility::Open,
            visibility_censures: ListVisibility::Open,
            visibility_hesitations: ListVisibility::Open,
            orphan_since: None,
            poll_failures: 0,
            max_list_size: 1000,
            created_at: chrono::Utc::now().into(),
            updated_at: None,
        }
    }

    pub fn context(db: MockDatabase, probe: StaticProbe) -> ServiceContext {
        context_with(db, probe, Arc::new(RecordingNotifier::default()))
    }

    /// SQL sent through `ctx`, in order. Every other holder of the
    /// connection must be dropped first.
    pub fn executed_sql(ctx: ServiceContext) -> Vec<String> {
        let Ok(db) = Arc::try_unwrap(ctx.db) else {
            panic!("connection is still shared");
        };
        db.into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().iter().map(|s| s.sql.clone()))
            .collect()
    }

    pub fn ran(sql: &[String], prefix: &str) -> bool {
        sql.iter().any(|s| s.starts_with(prefix))
    }

    pub fn context_with(
        db: MockDatabase,
        probe: StaticProbe,
        notifier: Arc<RecordingNotifier>,
    ) -> ServiceContext {
        ServiceContext::new(
            Arc::new(db.into_connection()),
            settings(),
            notifier,
            Arc::new(probe),
        )
    }
}
