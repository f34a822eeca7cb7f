//! Audit log queries.

use fediseer_common::{AppResult, parse_domain_csv};
use fediseer_db::{
    entities::report::{self, ReportActivity, ReportType},
    repositories::{ReportFilter, ReportRepository},
};
use serde::Deserialize;

use super::context::ServiceContext;

/// Entries per page.
pub const REPORTS_PER_PAGE: u64 = 10;

/// Audit query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    /// Comma-separated source domains.
    #[serde(default)]
    pub source_domains: Option<String>,
    /// Comma-separated target domains.
    #[serde(default)]
    pub target_domains: Option<String>,
    #[serde(default)]
    pub report_type: Option<ReportType>,
    #[serde(default)]
    pub report_activity: Option<ReportActivity>,
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<u64>,
}

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    ctx: ServiceContext,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// One page of matching entries, newest first.
    pub async fn query(&self, query: &ReportQuery) -> AppResult<Vec<report::Model>> {
        let filter = ReportFilter {
            source_domains: csv(query.source_domains.as_deref())?,
            target_domains: csv(query.target_domains.as_deref())?,
            report_type: query.report_type,
            report_activity: query.report_activity,
        };
        let page = query.page.unwrap_or(1).max(1);
        let entries = ReportRepository::new(self.ctx.db.as_ref())
            .query(&filter, REPORTS_PER_PAGE, (page - 1) * REPORTS_PER_PAGE)
            .await?;
        tracing::debug!(page = page, count = entries.len(), "Queried reports");
        Ok(entries)
    }
}

fn csv(value: Option<&str>) -> AppResult<Vec<String>> {
    value.map_or_else(|| Ok(vec![]), parse_domain_csv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{probe::test_support::StaticProbe, test_support::context};
    use fediseer_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_query_returns_page() {
        let entry = report::Model {
            id: 1,
            source_domain: "a.example".to_string(),
            target_domain: "[REDACTED]".to_string(),
            report_type: ReportType::Censure,
            report_activity: ReportActivity::Added,
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[entry]]);
        let service = ReportService::new(context(db, StaticProbe::default()));

        let entries = service
            .query(&ReportQuery {
                source_domains: Some("A.example".to_string()),
                page: Some(0),
                ..ReportQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target_domain, "[REDACTED]");
    }

    #[tokio::test]
    async fn test_invalid_domain_filter_rejected() {
        let service = ReportService::new(context(
            MockDatabase::new(DatabaseBackend::Postgres),
            StaticProbe::default(),
        ));

        let result = service
            .query(&ReportQuery {
                target_domains: Some("not a domain".to_string()),
                ..ReportQuery::default()
            })
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
