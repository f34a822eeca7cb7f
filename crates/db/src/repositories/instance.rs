//! Instance repository.

use crate::entities::{Instance, instance};
use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};

/// Instance repository for database operations.
///
/// Borrows its connection so the same code runs on a pool or inside a
/// transaction.
pub struct InstanceRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> InstanceRepository<'a, C> {
    /// Create a new instance repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find an instance by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<instance::Model>> {
        Instance::find_by_id(id)
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an instance by domain.
    pub async fn find_by_domain(&self, domain: &str) -> AppResult<Option<instance::Model>> {
        Instance::find()
            .filter(instance::Column::Domain.eq(domain.to_lowercase()))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an instance by domain, or error if not found.
    pub async fn get_by_domain(&self, domain: &str) -> AppResult<instance::Model> {
        self.find_by_domain(domain)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Instance not registered: {domain}")))
    }

    /// Find instances by IDs.
    pub async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<instance::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Instance::find()
            .filter(instance::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(instance::Column::Id)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find instances by domains. Unknown domains are skipped.
    pub async fn find_by_domains(&self, domains: &[String]) -> AppResult<Vec<instance::Model>> {
        if domains.is_empty() {
            return Ok(vec![]);
        }
        Instance::find()
            .filter(instance::Column::Domain.is_in(domains.iter().map(|d| d.to_lowercase())))
            .order_by_asc(instance::Column::Id)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all instances, optionally restricted to some software families.
    pub async fn find_all(&self, software: Option<&[String]>) -> AppResult<Vec<instance::Model>> {
        let mut query = Instance::find().order_by_asc(instance::Column::Id);
        if let Some(software) = software {
            query = query.filter(
                instance::Column::Software.is_in(software.iter().map(|s| s.to_lowercase())),
            );
        }
        query
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new instance.
    pub async fn create(&self, model: instance::ActiveModel) -> AppResult<instance::Model> {
        model
            .insert(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an instance.
    pub async fn update(&self, model: instance::ActiveModel) -> AppResult<instance::Model> {
        model
            .update(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set or clear the orphan marker on several instances at once.
    pub async fn set_orphan_since(
        &self,
        ids: &[i32],
        orphan_since: Option<DateTime<FixedOffset>>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = Instance::update_many()
            .col_expr(instance::Column::OrphanSince, Expr::value(orphan_since))
            .filter(instance::Column::Id.is_in(ids.iter().copied()))
            .exec(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::instance::ListVisibility;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_instance(id: i32, domain: &str) -> instance::Model {
        instance::Model {
            id,
            domain: domain.to_string(),
            software: "lemmy".to_string(),
            open_registrations: false,
            approval_required: true,
            email_verify: true,
            has_captcha: false,
            sysadmins: None,
            moderators: None,
            visibility_endorsements: ListVisibility::Open,
            visibility_censures: ListVisibility::Open,
            visibility_hesitations: ListVisibility::Open,
            orphan_since: None,
            poll_failures: 0,
            max_list_size: 1000,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_domain_found() {
        let model = create_test_instance(3, "lemmy.example");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[model.clone()]])
            .into_connection();

        let repo = InstanceRepository::new(&db);
        let found = repo.find_by_domain("Lemmy.Example").await.unwrap();

        assert_eq!(found.unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_get_by_domain_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<instance::Model>::new()])
            .into_connection();

        let repo = InstanceRepository::new(&db);
        let result = repo.get_by_domain("missing.example").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let repo = InstanceRepository::new(&db);
        let found = repo.find_by_ids(&[]).await.unwrap();

        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_set_orphan_since() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .into_connection();

        let repo = InstanceRepository::new(&db);
        let affected = repo
            .set_orphan_since(&[4, 5], Some(Utc::now().fixed_offset()))
            .await
            .unwrap();

        assert_eq!(affected, 2);
    }
}
