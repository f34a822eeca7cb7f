//! Flag endpoints. Only the trust root may call these.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::put,
};
use fediseer_common::AppResult;
use fediseer_db::entities::instance_flag::FlagKind;
use serde::Deserialize;

use crate::{
    extractors::AuthInstance,
    middleware::AppState,
    response::{ApiResponse, MutationResponse},
};

/// Flag request.
#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub flag: FlagKind,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Flag removal query.
#[derive(Debug, Deserialize)]
pub struct FlagQuery {
    pub flag: FlagKind,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{domain}", put(add_flag).patch(modify_flag).delete(remove_flag))
}

async fn add_flag(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(req): Json<FlagRequest>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .moderation_service
        .add_flag(&principal.instance, &domain, req.flag, req.comment.as_deref())
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn modify_flag(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(req): Json<FlagRequest>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .moderation_service
        .modify_flag(&principal.instance, &domain, req.flag, req.comment.as_deref())
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn remove_flag(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<FlagQuery>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .moderation_service
        .remove_flag(&principal.instance, &domain, query.flag)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}
