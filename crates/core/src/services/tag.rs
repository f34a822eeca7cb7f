//! Self-assigned instance tags.

use std::collections::{BTreeMap, HashSet};

use fediseer_common::{AppError, AppResult, sanitize_text};
use fediseer_db::{entities::instance, repositories::TagRepository};
use sea_orm::TransactionTrait;

use super::context::{ServiceContext, gate_actor};
use crate::gate::TrustAction;

/// Longest tag kept.
const MAX_TAG_LEN: usize = 100;

/// Lowercase and de-duplicate requested tags.
fn normalize_tags(tags: &[String]) -> AppResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let Some(tag) = sanitize_text(Some(tag), Some(MAX_TAG_LEN)).map(|t| t.to_lowercase()) else {
            continue;
        };
        if !seen.insert(tag.clone()) {
            return Err(AppError::BadRequest(format!("Duplicate tag: {tag}")));
        }
        normalized.push(tag);
    }
    if normalized.is_empty() {
        return Err(AppError::BadRequest("No tags provided.".to_string()));
    }
    Ok(normalized)
}

/// Tag service.
#[derive(Clone)]
pub struct TagService {
    ctx: ServiceContext,
}

impl TagService {
    /// Create a new tag service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Add tags to the actor's instance. Returns the full tag list.
    #[tracing::instrument(skip(self, actor, tags), fields(actor = %actor.domain))]
    pub async fn add_tags(&self, actor: &instance::Model, tags: &[String]) -> AppResult<Vec<String>> {
        let requested = normalize_tags(tags)?;
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        gate_actor(&txn, &self.ctx.settings, actor, TrustAction::Tag).await?;

        let repo = TagRepository::new(&txn);
        let existing: HashSet<String> = repo
            .find_by_instance(actor.id)
            .await?
            .into_iter()
            .map(|t| t.tag)
            .collect();
        let new: Vec<String> = requested
            .into_iter()
            .filter(|t| !existing.contains(t))
            .collect();

        let max_tags = self.ctx.settings.trust.max_tags;
        if (existing.len() + new.len()) as u64 > max_tags {
            return Err(AppError::BadRequest(format!(
                "You cannot have more than {max_tags} tags."
            )));
        }
        repo.create_many(actor.id, &new).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(added = new.len(), "Tags added");

        let mut all: Vec<String> = existing.into_iter().chain(new).collect();
        all.sort();
        Ok(all)
    }

    /// Remove tags from the actor's instance. Returns how many were removed.
    #[tracing::instrument(skip(self, actor, tags), fields(actor = %actor.domain))]
    pub async fn remove_tags(&self, actor: &instance::Model, tags: &[String]) -> AppResult<u64> {
        let requested = normalize_tags(tags)?;
        let txn = self
            .ctx
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        gate_actor(&txn, &self.ctx.settings, actor, TrustAction::Tag).await?;

        let removed = TagRepository::new(&txn)
            .delete_many(actor.id, &requested)
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(removed = removed, "Tags removed");
        Ok(removed)
    }

    /// How many instances use each tag.
    pub async fn tag_counts(&self) -> AppResult<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for tag in TagRepository::new(self.ctx.db.as_ref()).find_all().await? {
            *counts.entry(tag.tag).or_default() += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{probe::test_support::StaticProbe, test_support::context};
    use fediseer_db::entities::instance_tag;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_normalize_lowercases() {
        let tags = normalize_tags(&["Furry".to_string(), " tech ".to_string()]).unwrap();
        assert_eq!(tags, vec!["furry".to_string(), "tech".to_string()]);
    }

    #[test]
    fn test_case_insensitive_duplicates_rejected() {
        let result = normalize_tags(&["Tech".to_string(), "tech".to_string()]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_blank_tags_rejected() {
        let result = normalize_tags(&["  ".to_string()]);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_tag_counts() {
        let tag = |id, instance_id, tag: &str| instance_tag::Model {
            id,
            instance_id,
            tag: tag.to_string(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            tag(1, 1, "tech"),
            tag(2, 2, "tech"),
            tag(3, 2, "art"),
        ]]);
        let service = TagService::new(context(db, StaticProbe::default()));

        let counts = service.tag_counts().await.unwrap();

        assert_eq!(counts.get("tech"), Some(&2));
        assert_eq!(counts.get("art"), Some(&1));
    }
}
