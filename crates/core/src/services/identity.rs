//! Identity service: API keys, claims, instance settings and the root.

use fediseer_common::{AppError, AppResult, generate_api_key, hash_api_key, normalize_domain};
use fediseer_db::{
    entities::{
        instance::{self, ListVisibility},
        instance_flag::FlagKind,
        claim,
        report::{ReportActivity, ReportType},
        user,
    },
    repositories::{
        FlagRepository, GuaranteeRepository, InstanceRepository, ReportRepository, UserRepository,
    },
};
use sea_orm::{ConnectionTrait, IntoActiveModel, Set, TransactionTrait};
use serde::{Deserialize, Serialize};

use super::{
    context::{ServiceContext, load_tree},
    registry::RegistryService,
    solicitation::SolicitationService,
    view::{InstanceView, build_view},
};

/// An authenticated admin and the instance it claimed.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: user::Model,
    pub instance: instance::Model,
}

/// Result of a successful claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub instance: InstanceView,
    /// `@username@domain` of the new admin account.
    pub account: String,
}

/// Requested settings changes. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub sysadmins: Option<i32>,
    #[serde(default)]
    pub moderators: Option<i32>,
    #[serde(default)]
    pub visibility_endorsements: Option<ListVisibility>,
    #[serde(default)]
    pub visibility_censures: Option<ListVisibility>,
    #[serde(default)]
    pub visibility_hesitations: Option<ListVisibility>,
    #[serde(default)]
    pub reset_api_key: bool,
    /// Admin who receives the new key by direct message.
    #[serde(default)]
    pub admin_username: Option<String>,
}

impl SettingsUpdate {
    fn changes_visibility(&self) -> bool {
        self.visibility_endorsements.is_some()
            || self.visibility_censures.is_some()
            || self.visibility_hesitations.is_some()
    }
}

/// Result of a settings update.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsOutcome {
    pub instance: InstanceView,
    /// Set only when the key was reset for the caller itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_api_key: Option<String>,
}

/// Identity service.
#[derive(Clone)]
pub struct IdentityService {
    ctx: ServiceContext,
    registry: RegistryService,
}

impl IdentityService {
    /// Create a new identity service.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            ctx,
        }
    }

    /// Resolve an API key to its principal.
    pub async fn authenticate(&self, api_key: &str) -> AppResult<Principal> {
        let conn = self.ctx.db.as_ref();
        let users = UserRepository::new(conn);
        let user = users
            .find_by_api_key_hash(&hash_api_key(api_key))
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;
        let claim = users
            .find_claim(user.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("API key has no claimed instance".to_string()))?;
        let instance = InstanceRepository::new(conn)
            .find_by_id(claim.instance_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Claimed instance no longer exists".to_string()))?;
        Ok(Principal { user, instance })
    }

    /// The principal's own instance.
    pub async fn whoami(&self, principal: &Principal) -> AppResult<InstanceView> {
        let conn = self.ctx.db.as_ref();
        let tree = load_tree(conn, &self.ctx.settings).await?;
        build_view(conn, &self.ctx.settings, &tree, principal.instance.clone()).await
    }

    /// Claim `domain` for `admin`, delivering a fresh API key by direct message.
    #[tracing::instrument(skip(self))]
    pub async fn claim(
        &self,
        domain: &str,
        admin: &str,
        guarantor: Option<&str>,
    ) -> AppResult<ClaimOutcome> {
        let instance = self.registry.ensure_registered(domain, false).await?;
        let admin = self.require_admin(&instance, admin).await?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let users = UserRepository::new(&txn);
        if users.count_claims(instance.id).await? > 0 {
            return Err(AppError::Forbidden(format!(
                "{} has already been claimed.",
                instance.domain
            )));
        }

        let api_key = generate_api_key();
        let (user, previous_hash) =
            upsert_user(&txn, &admin, &instance.domain, hash_api_key(&api_key)).await?;
        let claim = users.create_claim(user.id, instance.id).await?;
        ReportRepository::new(&txn)
            .record(
                &instance.domain,
                &instance.domain,
                ReportType::Claim,
                ReportActivity::Added,
            )
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        self.deliver_or_revoke(
            &api_key,
            IssuedKey {
                domain: instance.domain.clone(),
                admin: admin.clone(),
                user: user.clone(),
                previous_hash,
                new_claim: Some(claim),
            },
        )
        .await?;
        tracing::info!(account = %user.account, "Instance claimed");

        if let Some(guarantor) = guarantor
            && let Err(e) = SolicitationService::new(self.ctx.clone())
                .solicit(&instance, Some(guarantor), None)
                .await
        {
            tracing::warn!(guarantor = %guarantor, error = %e, "Solicitation after claim failed");
        }

        let view = self.whoami(&Principal {
            user: user.clone(),
            instance,
        })
        .await?;
        Ok(ClaimOutcome {
            instance: view,
            account: user.account,
        })
    }

    /// Change the principal's instance settings.
    ///
    /// A key reset for another admin is delivered after the commit. If that
    /// delivery fails the key is revoked, while the other changes stay.
    #[tracing::instrument(skip(self, principal, update), fields(actor = %principal.instance.domain))]
    pub async fn update_settings(
        &self,
        principal: &Principal,
        update: &SettingsUpdate,
    ) -> AppResult<SettingsOutcome> {
        let instance = &principal.instance;
        let target_admin = match (update.reset_api_key, update.admin_username.as_deref()) {
            (true, Some(admin)) => Some(self.require_admin(instance, admin).await?),
            _ => None,
        };

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if update.changes_visibility()
            && FlagRepository::new(&txn)
                .has_flag(instance.id, FlagKind::Muted)
                .await?
        {
            return Err(AppError::Forbidden(
                "Muted instances cannot change their visibility.".to_string(),
            ));
        }

        let updated = apply_settings(&txn, instance.clone(), update).await?;

        let mut new_api_key = None;
        let mut pending = None;
        if update.reset_api_key {
            let api_key = generate_api_key();
            let hash = hash_api_key(&api_key);
            let users = UserRepository::new(&txn);
            match target_admin {
                Some(admin) => {
                    let (user, previous_hash) =
                        upsert_user(&txn, &admin, &instance.domain, hash).await?;
                    let new_claim = match users.find_claim(user.id).await? {
                        Some(_) => None,
                        None => Some(users.create_claim(user.id, instance.id).await?),
                    };
                    pending = Some((
                        api_key,
                        IssuedKey {
                            domain: instance.domain.clone(),
                            admin,
                            user,
                            previous_hash,
                            new_claim,
                        },
                    ));
                }
                None => {
                    users.set_api_key_hash(principal.user.clone(), hash).await?;
                    new_api_key = Some(api_key);
                }
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if let Some((api_key, issued)) = pending {
            self.deliver_or_revoke(&api_key, issued).await?;
        }
        if update.reset_api_key {
            tracing::info!("API key reset");
        }

        let view = self.whoami(&Principal {
            user: principal.user.clone(),
            instance: updated,
        })
        .await?;
        Ok(SettingsOutcome {
            instance: view,
            new_api_key,
        })
    }

    /// Make sure the root instance, its self-guarantee and its admin exist.
    pub async fn bootstrap_root(&self) -> AppResult<instance::Model> {
        let settings = &self.ctx.settings;
        let root = &settings.root;
        let domain = normalize_domain(&root.domain)?;

        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let instances = InstanceRepository::new(&txn);
        let instance = match instances.find_by_id(root.id).await? {
            Some(existing) => existing,
            None => {
                let now = chrono::Utc::now().fixed_offset();
                instances
                    .create(instance::ActiveModel {
                        id: Set(root.id),
                        domain: Set(domain.clone()),
                        software: Set("fediseer".to_string()),
                        open_registrations: Set(false),
                        approval_required: Set(false),
                        email_verify: Set(false),
                        has_captcha: Set(false),
                        sysadmins: Set(None),
                        moderators: Set(None),
                        visibility_endorsements: Set(ListVisibility::Open),
                        visibility_censures: Set(ListVisibility::Open),
                        visibility_hesitations: Set(ListVisibility::Open),
                        orphan_since: Set(None),
                        poll_failures: Set(0),
                        max_list_size: Set(settings.trust.default_max_list_size),
                        created_at: Set(now),
                        updated_at: Set(None),
                    })
                    .await?
            }
        };

        let guarantees = GuaranteeRepository::new(&txn);
        if guarantees.find_by_guaranteed(root.id).await?.is_none() {
            guarantees.create(root.id, root.id).await?;
        }

        let users = UserRepository::new(&txn);
        let account = format!("@{}@{}", root.admin.to_lowercase(), domain);
        let configured_hash = settings.trust.root_api_key.as_deref().map(hash_api_key);
        let user = match users.find_by_account(&account).await? {
            Some(existing) => match configured_hash {
                Some(hash) if hash != existing.api_key => {
                    users.set_api_key_hash(existing, hash).await?
                }
                _ => existing,
            },
            None => {
                let hash = configured_hash.unwrap_or_else(|| {
                    tracing::warn!("No root API key configured; set trust.root_api_key to sign in as the root admin");
                    hash_api_key(&generate_api_key())
                });
                users.create(&root.admin, &domain, hash).await?
            }
        };
        if users.find_claim(user.id).await?.is_none() {
            users.create_claim(user.id, root.id).await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(domain = %instance.domain, admin = %user.account, "Root instance ready");
        Ok(instance)
    }

    /// Check `admin` against the instance's discoverable administrators.
    async fn require_admin(&self, instance: &instance::Model, admin: &str) -> AppResult<String> {
        let admin = admin.trim().trim_start_matches('@').to_string();
        let admins = self
            .ctx
            .probe
            .admins(&instance.domain, &instance.software)
            .await?;
        if admins.is_empty() {
            return Err(AppError::Unauthorized(format!(
                "No admins could be discovered for {}.",
                instance.domain
            )));
        }
        if !admins.iter().any(|a| a.eq_ignore_ascii_case(&admin)) {
            return Err(AppError::Forbidden(format!(
                "{admin} is not an admin of {}.",
                instance.domain
            )));
        }
        Ok(admin)
    }

    /// Send a committed key to its admin, or take it back if that fails.
    async fn deliver_or_revoke(&self, api_key: &str, issued: IssuedKey) -> AppResult<()> {
        let domain = issued.domain.as_str();
        let admin = issued.admin.as_str();
        let delivered = self
            .ctx
            .notifier
            .direct_message(domain, admin, &format!("Your API key for {domain} is {api_key}"))
            .await;
        let Err(e) = delivered else {
            return Ok(());
        };
        tracing::error!(domain = %domain, error = %e, "API key delivery failed");
        let err = AppError::ServiceUnavailable(format!("Could not deliver the API key to {admin}"));
        let account = issued.user.account.clone();
        match self.revoke(issued).await {
            Ok(()) => tracing::warn!(account = %account, "Revoked undelivered API key"),
            Err(e) => {
                tracing::error!(account = %account, error = %e, "Failed to revoke undelivered API key");
            }
        }
        Err(err)
    }

    async fn revoke(&self, issued: IssuedKey) -> AppResult<()> {
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let users = UserRepository::new(&txn);
        if let Some(claim) = issued.new_claim {
            users.delete_claim(claim).await?;
            ReportRepository::new(&txn)
                .record(
                    &issued.domain,
                    &issued.domain,
                    ReportType::Claim,
                    ReportActivity::Deleted,
                )
                .await?;
        }
        if let Some(hash) = issued.previous_hash {
            users.set_api_key_hash(issued.user, hash).await?;
        }
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// An API key already stored but not yet delivered.
struct IssuedKey {
    domain: String,
    admin: String,
    user: user::Model,
    /// Digest to restore when the user existed before.
    previous_hash: Option<String>,
    /// Claim created together with the key.
    new_claim: Option<claim::Model>,
}

/// Store `hash` on the admin's user, creating it if needed. Also returns the
/// digest it replaced.
async fn upsert_user<C: ConnectionTrait>(
    conn: &C,
    username: &str,
    domain: &str,
    hash: String,
) -> AppResult<(user::Model, Option<String>)> {
    let users = UserRepository::new(conn);
    match users
        .find_by_account(&format!("@{username}@{domain}"))
        .await?
    {
        Some(existing) => {
            let previous = existing.api_key.clone();
            Ok((users.set_api_key_hash(existing, hash).await?, Some(previous)))
        }
        None => Ok((users.create(username, domain, hash).await?, None)),
    }
}

async fn apply_settings<C: ConnectionTrait>(
    conn: &C,
    instance: instance::Model,
    update: &SettingsUpdate,
) -> AppResult<instance::Model> {
    let unchanged = update.sysadmins.is_none()
        && update.moderators.is_none()
        && !update.changes_visibility();
    if unchanged {
        return Ok(instance);
    }

    let mut active = instance.into_active_model();
    if let Some(n) = update.sysadmins {
        active.sysadmins = Set(Some(n));
    }
    if let Some(n) = update.moderators {
        active.moderators = Set(Some(n));
    }
    if let Some(v) = update.visibility_endorsements {
        active.visibility_endorsements = Set(v);
    }
    if let Some(v) = update.visibility_censures {
        active.visibility_censures = Set(v);
    }
    if let Some(v) = update.visibility_hesitations {
        active.visibility_hesitations = Set(v);
    }
    active.updated_at = Set(Some(chrono::Utc::now().fixed_offset()));
    InstanceRepository::new(conn).update(active).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::{
        notifier::test_support::RecordingNotifier,
        probe::test_support::StaticProbe,
        test_support::{context, context_with, executed_sql, instance_model},
    };
    use fediseer_db::entities::{claim, instance_flag, report};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn user_model(id: i32, username: &str, domain: &str) -> user::Model {
        user::Model {
            id,
            account: format!("@{username}@{domain}"),
            username: username.to_string(),
            api_key: hash_api_key("key"),
            created_at: chrono::Utc::now().into(),
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    #[tokio::test]
    async fn test_unknown_key_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = IdentityService::new(context(db, StaticProbe::default()));

        let result = service.authenticate("nope").await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_authenticate_resolves_instance() {
        let claim = claim::Model {
            id: 1,
            user_id: 7,
            instance_id: 3,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(7, "admin", "a.example")]])
            .append_query_results([[claim]])
            .append_query_results([[instance_model(3, "a.example")]]);
        let service = IdentityService::new(context(db, StaticProbe::default()));

        let principal = service.authenticate("key").await.unwrap();

        assert_eq!(principal.instance.domain, "a.example");
        assert_eq!(principal.user.id, 7);
    }

    #[tokio::test]
    async fn test_claim_without_discoverable_admins_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(3, "a.example")]]);
        let probe = StaticProbe::with("a.example", "mastodon", &[]);
        let service = IdentityService::new(context(db, probe));

        let result = service.claim("a.example", "admin", None).await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_claim_by_non_admin_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(3, "a.example")]]);
        let probe = StaticProbe::with("a.example", "mastodon", &["alice"]);
        let service = IdentityService::new(context(db, probe));

        let result = service.claim("a.example", "@mallory", None).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_claim_of_claimed_instance_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(3, "a.example")]])
            .append_query_results([[count_row(1)]]);
        let probe = StaticProbe::with("a.example", "mastodon", &["Alice"]);
        let service = IdentityService::new(context(db, probe));

        let result = service.claim("a.example", "alice", None).await;

        match result {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("already been claimed")),
            other => panic!("Expected Forbidden error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_fails_when_key_cannot_be_delivered() {
        let report = report::Model {
            id: 1,
            source_domain: "a.example".to_string(),
            target_domain: "a.example".to_string(),
            report_type: ReportType::Claim,
            report_activity: ReportActivity::Added,
            created_at: chrono::Utc::now().into(),
        };
        let claim = claim::Model {
            id: 1,
            user_id: 7,
            instance_id: 3,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[instance_model(3, "a.example")]])
            .append_query_results([[count_row(0)]])
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[user_model(7, "alice", "a.example")]])
            .append_query_results([[claim]])
            .append_query_results([[report.clone()]])
            // revocation
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[report::Model {
                report_activity: ReportActivity::Deleted,
                ..report
            }]]);
        let notifier = Arc::new(RecordingNotifier {
            fail_direct: true,
            ..RecordingNotifier::default()
        });
        let probe = StaticProbe::with("a.example", "mastodon", &["alice"]);
        let ctx = context_with(db, probe, notifier);
        let service = IdentityService::new(ctx.clone());

        let result = service.claim("a.example", "alice", None).await;
        drop(service);

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        // the key is stored first, then revoked once delivery fails
        let sql = executed_sql(ctx);
        let committed = sql.iter().position(|s| s == "COMMIT").unwrap();
        let revoked = sql
            .iter()
            .position(|s| s.starts_with(r#"DELETE FROM "claim""#))
            .unwrap();
        assert!(sql[..committed].iter().any(|s| s.starts_with(r#"INSERT INTO "claim""#)));
        assert!(committed < revoked);
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_muted_instance_cannot_change_visibility() {
        let muted = instance_flag::Model {
            id: 1,
            instance_id: 3,
            flag: FlagKind::Muted,
            comment: None,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[muted]]);
        let service = IdentityService::new(context(db, StaticProbe::default()));
        let principal = Principal {
            user: user_model(7, "alice", "a.example"),
            instance: instance_model(3, "a.example"),
        };

        let result = service
            .update_settings(
                &principal,
                &SettingsUpdate {
                    visibility_censures: Some(ListVisibility::Open),
                    ..SettingsUpdate::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
