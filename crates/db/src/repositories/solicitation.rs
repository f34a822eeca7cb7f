//! Solicitation repository.

use crate::entities::{Solicitation, solicitation};
use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// Solicitation repository for database operations.
pub struct SolicitationRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> SolicitationRepository<'a, C> {
    /// Create a new solicitation repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a solicitation from `source_id` to `target_id` (`None` = open call).
    pub async fn find_by_pair(
        &self,
        source_id: i32,
        target_id: Option<i32>,
    ) -> AppResult<Option<solicitation::Model>> {
        let query = Solicitation::find().filter(solicitation::Column::SourceId.eq(source_id));
        let query = match target_id {
            Some(id) => query.filter(solicitation::Column::TargetId.eq(id)),
            None => query.filter(solicitation::Column::TargetId.is_null()),
        };
        query
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether `source_id` filed any solicitation after `since`.
    pub async fn has_since(&self, source_id: i32, since: DateTime<FixedOffset>) -> AppResult<bool> {
        let found = Solicitation::find()
            .filter(solicitation::Column::SourceId.eq(source_id))
            .filter(solicitation::Column::CreatedAt.gt(since))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// All solicitations, oldest first.
    pub async fn find_all(&self) -> AppResult<Vec<solicitation::Model>> {
        Solicitation::find()
            .order_by_asc(solicitation::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a solicitation.
    pub async fn create(
        &self,
        source_id: i32,
        target_id: Option<i32>,
        comment: Option<String>,
    ) -> AppResult<solicitation::Model> {
        solicitation::ActiveModel {
            source_id: Set(source_id),
            target_id: Set(target_id),
            comment: Set(comment),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every solicitation filed by `source_id`.
    pub async fn delete_by_source(&self, source_id: i32) -> AppResult<u64> {
        Solicitation::delete_many()
            .filter(solicitation::Column::SourceId.eq(source_id))
            .exec(self.db)
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
