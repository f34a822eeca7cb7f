//! Guarantee repository.

use super::insert_err;
use crate::entities::{Guarantee, guarantee};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

/// Guarantee repository for database operations.
pub struct GuaranteeRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> GuaranteeRepository<'a, C> {
    /// Create a new guarantee repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Load every guarantee edge. The tree is small enough to walk in memory.
    pub async fn find_all(&self) -> AppResult<Vec<guarantee::Model>> {
        Guarantee::find()
            .order_by_asc(guarantee::Column::Id)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the guarantee held by an instance.
    pub async fn find_by_guaranteed(&self, guaranteed_id: i32) -> AppResult<Option<guarantee::Model>> {
        Guarantee::find()
            .filter(guarantee::Column::GuaranteedId.eq(guaranteed_id))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count guarantees given by an instance, excluding a self-guarantee.
    pub async fn count_by_guarantor(&self, guarantor_id: i32) -> AppResult<u64> {
        Guarantee::find()
            .filter(guarantee::Column::GuarantorId.eq(guarantor_id))
            .filter(guarantee::Column::GuaranteedId.ne(guarantor_id))
            .count(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a guarantee.
    ///
    /// A unique violation on the guaranteed side means another guarantor won
    /// the race and surfaces as a conflict.
    pub async fn create(&self, guarantor_id: i32, guaranteed_id: i32) -> AppResult<guarantee::Model> {
        let model = guarantee::ActiveModel {
            guarantor_id: Set(guarantor_id),
            guaranteed_id: Set(guaranteed_id),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        };

        model
            .insert(self.db)
            .await
            .map_err(|e| insert_err(&e, "Instance was guaranteed concurrently"))
    }

    /// Delete a guarantee.
    pub async fn delete(&self, model: guarantee::Model) -> AppResult<()> {
        model
            .delete(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_guarantee(id: i32, guarantor_id: i32, guaranteed_id: i32) -> guarantee::Model {
        guarantee::Model {
            id,
            guarantor_id,
            guaranteed_id,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_guaranteed() {
        let edge = create_test_guarantee(1, 0, 2);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[edge.clone()]])
            .into_connection();

        let repo = GuaranteeRepository::new(&db);
        let found = repo.find_by_guaranteed(2).await.unwrap();

        assert_eq!(found.unwrap().guarantor_id, 0);
    }

    #[tokio::test]
    async fn test_find_all() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_guarantee(1, 0, 0),
                create_test_guarantee(2, 0, 1),
                create_test_guarantee(3, 1, 2),
            ]])
            .into_connection();

        let repo = GuaranteeRepository::new(&db);
        let all = repo.find_all().await.unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(all[2].guarantor_id, 1);
    }

    #[tokio::test]
    async fn test_create_returns_model() {
        let edge = create_test_guarantee(9, 1, 5);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[edge.clone()]])
            .into_connection();

        let repo = GuaranteeRepository::new(&db);
        let created = repo.create(1, 5).await.unwrap();

        assert_eq!(created.guaranteed_id, 5);
    }
}
