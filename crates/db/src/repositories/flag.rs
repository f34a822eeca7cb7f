//! Instance flag repository.

use crate::entities::{
    InstanceFlag,
    instance_flag::{self, FlagKind},
};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};

/// Flag repository for database operations.
pub struct FlagRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> FlagRepository<'a, C> {
    /// Create a new flag repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Flags set on an instance.
    pub async fn find_by_instance(&self, instance_id: i32) -> AppResult<Vec<instance_flag::Model>> {
        InstanceFlag::find()
            .filter(instance_flag::Column::InstanceId.eq(instance_id))
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Flags set on any of `instance_ids`.
    pub async fn find_by_instances(
        &self,
        instance_ids: &[i32],
    ) -> AppResult<Vec<instance_flag::Model>> {
        if instance_ids.is_empty() {
            return Ok(vec![]);
        }
        InstanceFlag::find()
            .filter(instance_flag::Column::InstanceId.is_in(instance_ids.iter().copied()))
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find one flag.
    pub async fn find(
        &self,
        instance_id: i32,
        flag: FlagKind,
    ) -> AppResult<Option<instance_flag::Model>> {
        InstanceFlag::find()
            .filter(instance_flag::Column::InstanceId.eq(instance_id))
            .filter(instance_flag::Column::Flag.eq(flag))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether an instance carries `flag`.
    pub async fn has_flag(&self, instance_id: i32, flag: FlagKind) -> AppResult<bool> {
        Ok(self.find(instance_id, flag).await?.is_some())
    }

    /// Create a flag.
    pub async fn create(
        &self,
        instance_id: i32,
        flag: FlagKind,
        comment: Option<String>,
    ) -> AppResult<instance_flag::Model> {
        instance_flag::ActiveModel {
            instance_id: Set(instance_id),
            flag: Set(flag),
            comment: Set(comment),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the comment on a flag.
    pub async fn update_comment(
        &self,
        model: instance_flag::Model,
        comment: Option<String>,
    ) -> AppResult<instance_flag::Model> {
        let mut active: instance_flag::ActiveModel = model.into();
        active.comment = Set(comment);
        active
            .update(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a flag.
    pub async fn delete(&self, model: instance_flag::Model) -> AppResult<()> {
        model
            .delete(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
