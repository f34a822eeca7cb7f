//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use fediseer_core::{
    GuaranteeService, IdentityService, ModerationService, ReaderService, RebuttalService,
    ReportService, ServiceContext, SolicitationService, TagService, TrustEdgeService,
};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "apikey";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: IdentityService,
    pub guarantee_service: GuaranteeService,
    pub trust_edge_service: TrustEdgeService,
    pub rebuttal_service: RebuttalService,
    pub solicitation_service: SolicitationService,
    pub moderation_service: ModerationService,
    pub tag_service: TagService,
    pub reader_service: ReaderService,
    pub report_service: ReportService,
}

impl AppState {
    /// Build every service over one shared context.
    #[must_use]
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            identity_service: IdentityService::new(ctx.clone()),
            guarantee_service: GuaranteeService::new(ctx.clone()),
            trust_edge_service: TrustEdgeService::new(ctx.clone()),
            rebuttal_service: RebuttalService::new(ctx.clone()),
            solicitation_service: SolicitationService::new(ctx.clone()),
            moderation_service: ModerationService::new(ctx.clone()),
            tag_service: TagService::new(ctx.clone()),
            reader_service: ReaderService::new(ctx.clone()),
            report_service: ReportService::new(ctx.clone()),
        }
    }
}

/// Authentication middleware.
///
/// A request without the header stays anonymous. A request with an unknown
/// key is rejected outright.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(api_key) = api_key {
        match state.identity_service.authenticate(&api_key).await {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected API key");
                return e.into_response();
            }
        }
    }

    next.run(req).await
}
