//! HTTP API layer for fediseer-rs.
//!
//! - **Endpoints**: registry, guarantees, trust edges, rebuttals,
//!   solicitations, flags, tags and reports
//! - **Extractors**: API key authentication
//! - **Middleware**: key lookup, tracing, CORS
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use endpoints::router;
pub use middleware::{API_KEY_HEADER, AppState, auth_middleware};

/// Path prefix of the versioned API.
pub const API_PREFIX: &str = "/api/v1";

/// The full application with middleware applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
