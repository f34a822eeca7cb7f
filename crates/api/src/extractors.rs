//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use fediseer_common::AppError;
use fediseer_core::Principal;

/// Authenticated instance extractor.
#[derive(Debug, Clone)]
pub struct AuthInstance(pub Principal);

impl<S> FromRequestParts<S> for AuthInstance
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // set by auth middleware
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthInstance)
            .ok_or_else(|| AppError::Unauthorized("Missing apikey header".to_string()))
    }
}

/// Optional authenticated instance extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthInstance(pub Option<Principal>);

impl MaybeAuthInstance {
    /// The caller's instance, if authenticated.
    #[must_use]
    pub fn instance(&self) -> Option<&fediseer_db::entities::instance::Model> {
        self.0.as_ref().map(|p| &p.instance)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthInstance
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}
