//! Audit report endpoints.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use fediseer_common::AppResult;
use fediseer_core::ReportQuery;
use fediseer_db::entities::report;

use crate::{middleware::AppState, response::ApiResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_reports))
}

/// Newest reports first, ten per page.
async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<ApiResponse<Vec<report::Model>>> {
    let reports = state.report_service.query(&query).await?;
    Ok(ApiResponse::ok(reports))
}
