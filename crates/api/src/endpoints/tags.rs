//! Tag endpoints.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};
use fediseer_common::AppResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthInstance, middleware::AppState, response::ApiResponse};

/// Tags request.
#[derive(Debug, Deserialize, Validate)]
pub struct TagsRequest {
    #[validate(length(min = 1, max = 100))]
    pub tags: Vec<String>,
}

/// Tag removal response.
#[derive(Debug, Serialize)]
pub struct RemovedTags {
    pub removed: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(tag_counts).put(add_tags).delete(remove_tags))
}

/// Tag usage across all instances.
async fn tag_counts(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<BTreeMap<String, usize>>> {
    let counts = state.tag_service.tag_counts().await?;
    Ok(ApiResponse::ok(counts))
}

async fn add_tags(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Json(req): Json<TagsRequest>,
) -> AppResult<ApiResponse<Vec<String>>> {
    req.validate()?;
    let tags = state
        .tag_service
        .add_tags(&principal.instance, &req.tags)
        .await?;
    Ok(ApiResponse::ok(tags))
}

async fn remove_tags(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Json(req): Json<TagsRequest>,
) -> AppResult<ApiResponse<RemovedTags>> {
    req.validate()?;
    let removed = state
        .tag_service
        .remove_tags(&principal.instance, &req.tags)
        .await?;
    Ok(ApiResponse::ok(RemovedTags { removed }))
}
