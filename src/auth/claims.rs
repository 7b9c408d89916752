use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use super::{error::AuthError, roles::Role};

/// Claim carrying the subject identifier. Issuance and verification both go
/// through this constant.
pub const SUBJECT_CLAIM: &str = "userId";

/// Informational role snapshot for clients. Never consulted for authorization.
pub const ROLE_HINT_CLAIM: &str = "rol";

/// Primary key of a row in `usuario`.
pub type SubjectId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub subject: SubjectId,
    pub role_hint: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Claims {
    pub fn new(subject: SubjectId, role_hint: Option<Role>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            subject,
            role_hint: role_hint.map(|r| r.label().to_string()),
            issued_at: now,
            expires_at: now + ttl.as_secs() as i64,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(SUBJECT_CLAIM.to_string(), Value::from(self.subject));
        if let Some(hint) = &self.role_hint {
            map.insert(ROLE_HINT_CLAIM.to_string(), Value::from(hint.clone()));
        }
        map.insert("iat".to_string(), Value::from(self.issued_at));
        map.insert("exp".to_string(), Value::from(self.expires_at));
        Value::Object(map)
    }
}

impl TryFrom<Value> for Claims {
    type Error = AuthError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let subject = match value.get(SUBJECT_CLAIM) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or(AuthError::MissingSubject)?;

        Ok(Self {
            subject,
            role_hint: value.get(ROLE_HINT_CLAIM).and_then(Value::as_str).map(str::to_string),
            issued_at: value.get("iat").and_then(Value::as_i64).unwrap_or_default(),
            expires_at: value.get("exp").and_then(Value::as_i64).unwrap_or_default(),
        })
    }
}
