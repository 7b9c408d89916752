use thiserror::Error;

use super::{claims::SubjectId, roles::Role};
use crate::store::StoreError;

/// Why a request was turned away by the verifier or a gate.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("Authorization header is not valid text")]
    MalformedHeader,

    #[error("Authorization header must use Bearer token format")]
    InvalidScheme,

    #[error("Empty bearer token")]
    EmptyToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token does not identify a user")]
    MissingSubject,

    #[error("User {0} not found")]
    UnknownSubject(SubjectId),

    #[error("Role '{0}' is not recognized")]
    UnrecognizedRole(String),

    #[error("Role lookup timed out")]
    LookupTimedOut,

    #[error("Access denied")]
    Denied { gate: &'static str, role: Role },

    #[error("Access denied")]
    NotOwner { subject: SubjectId, owner: Option<SubjectId> },

    #[error("Role store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("Role lookup failed: {0}")]
    LookupFailed(#[source] StoreError),

    #[error("No authenticated principal on request")]
    MissingPrincipal,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Failure classes, each mapped to one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Unauthenticated,
    Forbidden,
    Unavailable,
    Precondition,
    Internal,
}

impl AuthError {
    pub fn kind(&self) -> AuthFailure {
        match self {
            AuthError::MissingCredentials
            | AuthError::MalformedHeader
            | AuthError::InvalidScheme
            | AuthError::EmptyToken
            | AuthError::Expired
            | AuthError::InvalidToken
            | AuthError::MissingSubject => AuthFailure::Unauthenticated,
            AuthError::UnknownSubject(_)
            | AuthError::UnrecognizedRole(_)
            | AuthError::LookupTimedOut
            | AuthError::Denied { .. }
            | AuthError::NotOwner { .. } => AuthFailure::Forbidden,
            AuthError::StoreUnavailable(_) => AuthFailure::Unavailable,
            AuthError::MissingPrincipal => AuthFailure::Precondition,
            AuthError::LookupFailed(_) | AuthError::Signing(_) => AuthFailure::Internal,
        }
    }
}
