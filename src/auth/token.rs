use std::fmt;
use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;

use super::{
    claims::{Claims, SubjectId},
    error::AuthError,
    roles::Role,
};

/// HS256 signer and validator sharing one secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` expiring after the configured TTL.
    pub fn issue(&self, subject: SubjectId, role_hint: Option<Role>) -> Result<String, AuthError> {
        self.sign(&Claims::new(subject, role_hint, self.ttl))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), &claims.to_value(), &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and expiry, then read the subject claim.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Value>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => {
                tracing::debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            }
        })?;
        Claims::try_from(data.claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
