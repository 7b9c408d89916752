use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use serde_json::Value;

use super::{
    claims::SubjectId,
    error::AuthError,
    principal::Principal,
    roles::Role,
    token::TokenCodec,
};
use crate::store::{Query, StoreError, TableStore};

pub const USER_TABLE: &str = "usuario";
pub const ROLE_COLUMN: &str = "rol";

/// Turns a bearer header into a [`Principal`] whose role comes from the store.
///
/// The role in the token is ignored. Every call performs exactly one role
/// lookup, so role changes apply on the caller's next request.
pub struct TokenVerifier {
    codec: Arc<TokenCodec>,
    store: Arc<dyn TableStore>,
    lookup_timeout: Duration,
}

impl TokenVerifier {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn TableStore>, lookup_timeout: Duration) -> Self {
        Self { codec, store, lookup_timeout }
    }

    pub async fn authenticate(&self, header: Option<&HeaderValue>) -> Result<Principal, AuthError> {
        let header = header.ok_or(AuthError::MissingCredentials)?;
        let token = parse_bearer(header)?;
        let claims = self.codec.decode(&token)?;
        let role = self.lookup_role(claims.subject).await?;
        Ok(Principal { subject_id: claims.subject, role })
    }

    /// Current persisted role of `subject`, bounded by the lookup timeout.
    pub async fn lookup_role(&self, subject: SubjectId) -> Result<Role, AuthError> {
        let query = Query::table(USER_TABLE).select(&[ROLE_COLUMN]).eq("id", subject);

        let row = match tokio::time::timeout(self.lookup_timeout, self.store.select_one(&query)).await {
            Err(_) | Ok(Err(StoreError::Timeout)) => return Err(AuthError::LookupTimedOut),
            Ok(Err(e)) if e.is_transient() => return Err(AuthError::StoreUnavailable(e)),
            Ok(Err(e)) => return Err(AuthError::LookupFailed(e)),
            Ok(Ok(None)) => return Err(AuthError::UnknownSubject(subject)),
            Ok(Ok(Some(row))) => row,
        };

        let label = row.get(ROLE_COLUMN).and_then(Value::as_str).unwrap_or_default();
        label
            .parse()
            .map_err(|_| AuthError::UnrecognizedRole(label.to_string()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn parse_bearer(value: &HeaderValue) -> Result<String, AuthError> {
    let raw = value.to_str().map_err(|_| AuthError::MalformedHeader)?.trim();
    if raw == "Bearer" {
        return Err(AuthError::EmptyToken);
    }
    let token = raw.strip_prefix("Bearer ").ok_or(AuthError::InvalidScheme)?.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token.to_string())
}
