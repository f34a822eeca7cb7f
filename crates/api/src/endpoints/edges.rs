//! Endorsement, censure and hesitation endpoints.
//!
//! The three kinds share handlers; the router for each kind carries its
//! [`EdgeKind`] as a request extension.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use fediseer_common::AppResult;
use fediseer_core::{
    BatchRequest, EdgeInput, GivenQuery, JudgedInstance, ReceivedEdge, batch::BatchOutcome,
};
use fediseer_db::repositories::EdgeKind;

use crate::{
    extractors::{AuthInstance, MaybeAuthInstance},
    middleware::AppState,
    response::{ApiResponse, ListFormat, Listing, MutationResponse},
};

/// Routes on a single kind, nested at `/endorsements`, `/censures` or `/hesitations`.
pub fn router(kind: EdgeKind) -> Router<AppState> {
    Router::new()
        .route("/", put(batch))
        .route(
            "/{domain}",
            get(received).put(add).patch(modify).delete(remove),
        )
        .layer(Extension(kind))
}

/// Routes listing what a set of sources gave, nested at `/<kind>s_given`.
pub fn given_router(kind: EdgeKind) -> Router<AppState> {
    Router::new()
        .route("/{domains}", get(given))
        .layer(Extension(kind))
}

async fn add(
    Extension(kind): Extension<EdgeKind>,
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(input): Json<EdgeInput>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .trust_edge_service
        .add(&principal.instance, kind, &domain, input)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn modify(
    Extension(kind): Extension<EdgeKind>,
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(input): Json<EdgeInput>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .trust_edge_service
        .modify(&principal.instance, kind, &domain, input)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

async fn remove(
    Extension(kind): Extension<EdgeKind>,
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<MutationResponse>> {
    let mutation = state
        .trust_edge_service
        .remove(&principal.instance, kind, &domain)
        .await?;
    Ok(ApiResponse::ok(mutation.into()))
}

/// Replace the caller's whole list of this kind.
async fn batch(
    Extension(kind): Extension<EdgeKind>,
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> AppResult<ApiResponse<BatchOutcome>> {
    let outcome = state
        .trust_edge_service
        .batch(&principal.instance, kind, req)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Edges `domain` received.
async fn received(
    Extension(kind): Extension<EdgeKind>,
    requester: MaybeAuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(format): Query<ListFormat>,
) -> AppResult<Json<Listing<ReceivedEdge>>> {
    let edges = state
        .reader_service
        .received_by(kind, requester.instance(), &domain)
        .await?;
    Ok(Json(format.project(edges)))
}

/// Targets judged by the comma-separated `domains`.
async fn given(
    Extension(kind): Extension<EdgeKind>,
    requester: MaybeAuthInstance,
    State(state): State<AppState>,
    Path(domains): Path<String>,
    Query(query): Query<GivenQuery>,
    Query(format): Query<ListFormat>,
) -> AppResult<Json<Listing<JudgedInstance>>> {
    let judged = state
        .reader_service
        .given_by(kind, requester.instance(), &domains, &query)
        .await?;
    Ok(Json(format.project(judged)))
}
