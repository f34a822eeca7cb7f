//! Instance registry endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use fediseer_common::{AppError, AppResult};
use fediseer_core::{ClaimOutcome, InstanceView, SettingsOutcome, SettingsUpdate, WhitelistFilter};
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::AuthInstance,
    middleware::AppState,
    response::{ApiResponse, ListFormat, Listing},
};

/// Claim request.
#[derive(Debug, Deserialize, Validate)]
pub struct ClaimRequest {
    /// Admin account on the instance that receives the key.
    #[validate(length(min = 1, max = 255))]
    pub admin: String,
    /// Guarantor to solicit right away.
    #[serde(default)]
    pub guarantor: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/instances", get(list_instances))
        .route("/instances/{domain}", get(instance_details))
        .route("/find", get(find_self))
        .route(
            "/whitelist/{domain}",
            get(instance_details).put(claim).patch(update_settings),
        )
}

/// Instances with an unbroken guarantee chain.
async fn list_instances(
    State(state): State<AppState>,
    Query(filter): Query<WhitelistFilter>,
    Query(format): Query<ListFormat>,
) -> AppResult<Json<Listing<InstanceView>>> {
    let instances = state.reader_service.whitelist(&filter).await?;
    Ok(Json(format.project(instances)))
}

async fn instance_details(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> AppResult<ApiResponse<InstanceView>> {
    let view = state.reader_service.instance_details(&domain).await?;
    Ok(ApiResponse::ok(view))
}

/// The caller's own instance.
async fn find_self(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<InstanceView>> {
    let view = state.identity_service.whoami(&principal).await?;
    Ok(ApiResponse::ok(view))
}

async fn claim(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(req): Json<ClaimRequest>,
) -> AppResult<ApiResponse<ClaimOutcome>> {
    req.validate()?;
    let outcome = state
        .identity_service
        .claim(&domain, &req.admin, req.guarantor.as_deref())
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Only the instance itself may change its settings.
async fn update_settings(
    AuthInstance(principal): AuthInstance,
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> AppResult<ApiResponse<SettingsOutcome>> {
    if !principal.instance.domain.eq_ignore_ascii_case(domain.trim()) {
        return Err(AppError::Forbidden(
            "You can only modify your own instance.".to_string(),
        ));
    }
    let outcome = state
        .identity_service
        .update_settings(&principal, &update)
        .await?;
    Ok(ApiResponse::ok(outcome))
}
