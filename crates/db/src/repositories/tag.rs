//! Instance tag repository.

use crate::entities::{InstanceTag, instance_tag};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

/// Tag repository for database operations.
pub struct TagRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TagRepository<'a, C> {
    /// Create a new tag repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Tags of one instance.
    pub async fn find_by_instance(&self, instance_id: i32) -> AppResult<Vec<instance_tag::Model>> {
        InstanceTag::find()
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .order_by_asc(instance_tag::Column::Tag)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Tags of several instances.
    pub async fn find_by_instances(
        &self,
        instance_ids: &[i32],
    ) -> AppResult<Vec<instance_tag::Model>> {
        if instance_ids.is_empty() {
            return Ok(vec![]);
        }
        InstanceTag::find()
            .filter(instance_tag::Column::InstanceId.is_in(instance_ids.iter().copied()))
            .order_by_asc(instance_tag::Column::Tag)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every tag row.
    pub async fn find_all(&self) -> AppResult<Vec<instance_tag::Model>> {
        InstanceTag::find()
            .order_by_asc(instance_tag::Column::Tag)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of tags on an instance.
    pub async fn count_by_instance(&self, instance_id: i32) -> AppResult<u64> {
        InstanceTag::find()
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .count(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add tags to an instance.
    pub async fn create_many(&self, instance_id: i32, tags: &[String]) -> AppResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let models = tags.iter().map(|tag| instance_tag::ActiveModel {
            instance_id: Set(instance_id),
            tag: Set(tag.clone()),
            ..Default::default()
        });
        InstanceTag::insert_many(models)
            .exec(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove tags from an instance.
    pub async fn delete_many(&self, instance_id: i32, tags: &[String]) -> AppResult<u64> {
        if tags.is_empty() {
            return Ok(0);
        }
        InstanceTag::delete_many()
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .filter(instance_tag::Column::Tag.is_in(tags.iter().cloned()))
            .exec(self.db)
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
