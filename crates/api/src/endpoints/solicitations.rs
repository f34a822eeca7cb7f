//! Solicitation endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use fediseer_common::AppResult;
use fediseer_core::{Mutation, SolicitationView};
use serde::Deserialize;

use crate::{
    extractors::AuthInstance,
    middleware::AppState,
    response::{ApiResponse, ListFormat, Listing, MutationResponse},
};

/// Solicit request.
#[derive(Debug, Default, Deserialize)]
pub struct SolicitRequest {
    /// Address the request to one guarantor instead of everyone.
    #[serde(default)]
    pub guarantor: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_solicitations).put(solicit))
}

async fn list_solicitations(
    State(state): State<AppState>,
    Query(format): Query<ListFormat>,
) -> AppResult<Json<Listing<SolicitationView>>> {
    let solicitations = state.solicitation_service.list().await?;
    Ok(Json(format.project(solicitations)))
}

async fn solicit(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Json(req): Json<SolicitRequest>,
) -> AppResult<ApiResponse<MutationResponse>> {
    state
        .solicitation_service
        .solicit(
            &principal.instance,
            req.guarantor.as_deref(),
            req.comment.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(Mutation::Created.into()))
}
