//! Rebuttal endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use fediseer_common::AppResult;
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::AuthInstance,
    middleware::AppState,
    response::{ApiResponse, MutationResponse},
};

/// Rebuttal request.
#[derive(Debug, Deserialize, Validate)]
pub struct RebuttalRequest {
    #[validate(length(min = 1))]
    pub rebuttal: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{domain}",
        put(add_rebuttal).patch(modify_rebuttal).delete(remove_rebuttal),
    )
}

async fn add_rebuttal(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(req): Json<RebuttalRequest>,
) -> AppResult<ApiResponse<MutationResponse>> {
    req.validate()?;
    let mutation = state
        .rebuttal_service
        .add(&principal.instance, &domain, &req.rebuttal)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn modify_rebuttal(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(req): Json<RebuttalRequest>,
) -> AppResult<ApiResponse<MutationResponse>> {
    req.validate()?;
    let mutation = state
        .rebuttal_service
        .modify(&principal.instance, &domain, &req.rebuttal)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn remove_rebuttal(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .rebuttal_service
        .remove(&principal.instance, &domain)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}
