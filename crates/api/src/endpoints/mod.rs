//! API endpoints.

mod edges;
mod flags;
mod guarantees;
mod instances;
mod rebuttals;
mod reports;
mod solicitations;
mod tags;

use axum::Router;
use fediseer_db::repositories::EdgeKind;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(instances::router())
        .merge(guarantees::router())
        .nest("/endorsements", edges::router(EdgeKind::Endorsement))
        .nest("/censures", edges::router(EdgeKind::Censure))
        .nest("/hesitations", edges::router(EdgeKind::Hesitation))
        .nest("/endorsements_given", edges::given_router(EdgeKind::Endorsement))
        .nest("/censures_given", edges::given_router(EdgeKind::Censure))
        .nest("/hesitations_given", edges::given_router(EdgeKind::Hesitation))
        .nest("/rebuttals", rebuttals::router())
        .nest("/solicitations", solicitations::router())
        .nest("/flags", flags::router())
        .nest("/tags", tags::router())
        .nest("/reports", reports::router())
}
