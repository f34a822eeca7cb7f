//! User and claim repository.

use crate::entities::{Claim, User, claim, user};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};

/// User repository for database operations.
pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a user by API key digest.
    pub async fn find_by_api_key_hash(&self, hash: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::ApiKey.eq(hash))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by account handle.
    pub async fn find_by_account(&self, account: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Account.eq(account.to_lowercase()))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a user.
    pub async fn create(
        &self,
        username: &str,
        domain: &str,
        api_key_hash: String,
    ) -> AppResult<user::Model> {
        user::ActiveModel {
            account: Set(format!("@{}@{}", username.to_lowercase(), domain.to_lowercase())),
            username: Set(username.to_string()),
            api_key: Set(api_key_hash),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace a user's API key digest.
    pub async fn set_api_key_hash(&self, model: user::Model, hash: String) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = model.into();
        active.api_key = Set(hash);
        active
            .update(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claim held by a user.
    pub async fn find_claim(&self, user_id: i32) -> AppResult<Option<claim::Model>> {
        Claim::find()
            .filter(claim::Column::UserId.eq(user_id))
            .one(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of users that claimed an instance.
    pub async fn count_claims(&self, instance_id: i32) -> AppResult<u64> {
        Claim::find()
            .filter(claim::Column::InstanceId.eq(instance_id))
            .count(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claims on several instances.
    pub async fn find_claims_by_instances(
        &self,
        instance_ids: &[i32],
    ) -> AppResult<Vec<claim::Model>> {
        if instance_ids.is_empty() {
            return Ok(vec![]);
        }
        Claim::find()
            .filter(claim::Column::InstanceId.is_in(instance_ids.iter().copied()))
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Link a user to an instance.
    pub async fn create_claim(&self, user_id: i32, instance_id: i32) -> AppResult<claim::Model> {
        claim::ActiveModel {
            user_id: Set(user_id),
            instance_id: Set(instance_id),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unlink a user from its instance.
    pub async fn delete_claim(&self, model: claim::Model) -> AppResult<()> {
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

    #[tokio::test]
    async fn test_find_by_api_key_hash() {
        let model = user::Model {
            id: 1,
            account: "@admin@lemmy.example".to_string(),
            username: "admin".to_string(),
            api_key: "abc".to_string(),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[model]])
            .into_connection();

        let repo = UserRepository::new(&db);
        let found = repo.find_by_api_key_hash("abc").await.unwrap();

        assert_eq!(found.unwrap().username, "admin");
    }
}
