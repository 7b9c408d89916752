use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use super::{claims::SubjectId, error::AuthError, roles::Role};
use crate::error::ApiError;

/// Verified identity of the caller for the lifetime of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: SubjectId,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| ApiError::from(AuthError::MissingPrincipal))
    }
}
