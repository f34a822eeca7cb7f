//! Rejection (withdraw cooldown) repository.

use crate::entities::{Rejection, rejection};
use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

/// Rejection repository for database operations.
pub struct RejectionRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RejectionRepository<'a, C> {
    /// Create a new rejection repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find the record for a (rejector, rejected) pair.
    pub async fn find_by_pair(
        &self,
        rejector_id: i32,
        rejected_id: i32,
    ) -> AppResult<Option<rejection::Model>> {
        Rejection::find()
            .filter(rejection::Column::RejectorId.eq(rejector_id))
            .filter(rejection::Column::RejectedId.eq(rejected_id))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create the record or move its timestamp to `performed`.
    pub async fn touch(
        &self,
        rejector_id: i32,
        rejected_id: i32,
        performed: DateTime<FixedOffset>,
    ) -> AppResult<rejection::Model> {
        let result = match self.find_by_pair(rejector_id, rejected_id).await? {
            Some(existing) => {
                let mut active: rejection::ActiveModel = existing.into();
                active.performed = Set(performed);
                active.update(self.db).await
            }
            None => {
                rejection::ActiveModel {
                    rejector_id: Set(rejector_id),
                    rejected_id: Set(rejected_id),
                    performed: Set(performed),
                    ..Default::default()
                }
                .insert(self.db)
                .await
            }
        };
        result.map_err(|e| AppError::Database(e.to_string()))
    }
}
