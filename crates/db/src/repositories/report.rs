//! Report (audit log) repository.

use crate::entities::{
    Report,
    report::{self, ReportActivity, ReportType},
};
use chrono::{DateTime, FixedOffset};
use fediseer_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Target placeholder when the source hides this kind of edge.
pub const REDACTED_TARGET: &str = "[REDACTED]";

/// Target placeholder for batch operations.
pub const MULTIPLE_TARGETS: &str = "[MULTIPLE]";

/// Audit log query filter.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub source_domains: Vec<String>,
    pub target_domains: Vec<String>,
    pub report_type: Option<ReportType>,
    pub report_activity: Option<ReportActivity>,
}

/// Report repository for database operations.
pub struct ReportRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ReportRepository<'a, C> {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Append an audit entry.
    pub async fn record(
        &self,
        source_domain: &str,
        target_domain: &str,
        report_type: ReportType,
        report_activity: ReportActivity,
    ) -> AppResult<report::Model> {
        report::ActiveModel {
            source_domain: Set(source_domain.to_string()),
            target_domain: Set(target_domain.to_string()),
            report_type: Set(report_type),
            report_activity: Set(report_activity),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Entries recorded by `source_domain` after `since`.
    pub async fn count_since(
        &self,
        source_domain: &str,
        since: DateTime<FixedOffset>,
    ) -> AppResult<u64> {
        Report::find()
            .filter(report::Column::SourceDomain.eq(source_domain))
            .filter(report::Column::CreatedAt.gt(since))
            .count(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Filtered audit entries, newest first.
    pub async fn query(
        &self,
        filter: &ReportFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<report::Model>> {
        let mut query = Report::find();
        if !filter.source_domains.is_empty() {
            query = query.filter(report::Column::SourceDomain.is_in(filter.source_domains.clone()));
        }
        if !filter.target_domains.is_empty() {
            query = query.filter(report::Column::TargetDomain.is_in(filter.target_domains.clone()));
        }
        if let Some(report_type) = filter.report_type {
            query = query.filter(report::Column::ReportType.eq(report_type));
        }
        if let Some(activity) = filter.report_activity {
            query = query.filter(report::Column::ReportActivity.eq(activity));
        }
        query
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_report(id: i32, source: &str, target: &str) -> report::Model {
        report::Model {
            id,
            source_domain: source.to_string(),
            target_domain: target.to_string(),
            report_type: ReportType::Censure,
            report_activity: ReportActivity::Added,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_report(1, "a.example", REDACTED_TARGET)]])
            .into_connection();

        let repo = ReportRepository::new(&db);
        let entry = repo
            .record(
                "a.example",
                REDACTED_TARGET,
                ReportType::Censure,
                ReportActivity::Added,
            )
            .await
            .unwrap();

        assert_eq!(entry.target_domain, "[REDACTED]");
    }

    #[tokio::test]
    async fn test_query_returns_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_report(2, "a.example", "b.example"),
                create_test_report(1, "a.example", "c.example"),
            ]])
            .into_connection();

        let repo = ReportRepository::new(&db);
        let filter = ReportFilter {
            source_domains: vec!["a.example".to_string()],
            report_type: Some(ReportType::Censure),
            ..Default::default()
        };
        let rows = repo.query(&filter, 10, 0).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 2);
    }
}
