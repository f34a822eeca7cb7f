//! Rebuttal repository.

use crate::entities::{Rebuttal, rebuttal};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};

/// Rebuttal repository for database operations.
pub struct RebuttalRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RebuttalRepository<'a, C> {
    /// Create a new rebuttal repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find the rebuttal `source_id` wrote against `target_id`.
    pub async fn find_by_pair(
        &self,
        source_id: i32,
        target_id: i32,
    ) -> AppResult<Option<rebuttal::Model>> {
        Rebuttal::find()
            .filter(rebuttal::Column::SourceId.eq(source_id))
            .filter(rebuttal::Column::TargetId.eq(target_id))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Rebuttals written by `source_id` against any of `target_ids`.
    pub async fn find_by_source(
        &self,
        source_id: i32,
        target_ids: &[i32],
    ) -> AppResult<Vec<rebuttal::Model>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }
        Rebuttal::find()
            .filter(rebuttal::Column::SourceId.eq(source_id))
            .filter(rebuttal::Column::TargetId.is_in(target_ids.iter().copied()))
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a rebuttal.
    pub async fn create(
        &self,
        source_id: i32,
        target_id: i32,
        text: String,
    ) -> AppResult<rebuttal::Model> {
        rebuttal::ActiveModel {
            source_id: Set(source_id),
            target_id: Set(target_id),
            rebuttal: Set(text),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the rebuttal text.
    pub async fn update_text(
        &self,
        model: rebuttal::Model,
        text: String,
    ) -> AppResult<rebuttal::Model> {
        let mut active: rebuttal::ActiveModel = model.into();
        active.rebuttal = Set(text);
        active.updated_at = Set(Some(chrono::Utc::now().fixed_offset()));
        active
            .update(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a rebuttal.
    pub async fn delete(&self, model: rebuttal::Model) -> AppResult<()> {
        model
            .delete(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
