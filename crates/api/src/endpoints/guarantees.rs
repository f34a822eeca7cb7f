//! Guarantee endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use fediseer_common::{AppError, AppResult};
use fediseer_core::InstanceView;

use crate::{
    extractors::AuthInstance,
    middleware::AppState,
    response::{ApiResponse, ListFormat, Listing, MutationResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/guarantees/{domain}",
            put(guarantee).delete(withdraw).get(guarantees_given),
        )
        .route("/guarantors/{domain}", get(guarantor))
}

async fn guarantee(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .guarantee_service
        .guarantee(&principal.instance, &domain)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn withdraw(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .guarantee_service
        .withdraw(&principal.instance, &domain)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

/// Instances guaranteed by `domain`.
async fn guarantees_given(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(format): Query<ListFormat>,
) -> AppResult<Json<Listing<InstanceView>>> {
    let instances = state.reader_service.guarantees_given_by(&domain).await?;
    Ok(Json(format.project(instances)))
}

async fn guarantor(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<InstanceView>> {
    let guarantor = state
        .reader_service
        .guarantor_of(&domain)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{domain} is not guaranteed")))?;
    Ok(ApiResponse::ok(guarantor))
}
