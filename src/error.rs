// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::{AuthError, AuthFailure, PasswordError};
use crate::store::StoreError;

/// HTTP API error with a status code and a client-safe message.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    MissingFields(Vec<String>),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::MissingFields(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::MissingFields(fields) => format!("Missing required fields: {}", fields.join(", ")),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MissingFields(_) => "MISSING_FIELDS",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Response body: `{"error": <message>, "code": <CODE>}`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.message(),
            "code": self.error_code(),
        });
        if let ApiError::MissingFields(fields) = self {
            body["fields"] = json!(fields);
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApiError::MissingFields(fields.into_iter().map(Into::into).collect())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err.kind() {
            AuthFailure::Unauthenticated => ApiError::unauthorized(err.to_string()),
            AuthFailure::Forbidden => ApiError::forbidden(err.to_string()),
            AuthFailure::Unavailable => {
                tracing::error!(error = %err, "role lookup failed");
                ApiError::service_unavailable("Authorization service temporarily unavailable")
            }
            AuthFailure::Precondition => {
                tracing::error!(error = %err, "role gate reached without a verified principal");
                ApiError::bad_request("Request was not authenticated")
            }
            AuthFailure::Internal => {
                tracing::error!(error = %err, "authentication internals failed");
                ApiError::internal_server_error("Authentication failed")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Conflict(msg) => {
                tracing::warn!("Store conflict: {}", msg);
                ApiError::conflict("Resource already exists")
            }
            StoreError::Unavailable(_) | StoreError::Timeout => {
                tracing::error!("Store unavailable: {}", err);
                ApiError::service_unavailable("Data store temporarily unavailable")
            }
            StoreError::Rejected { status: 400..=499, message } => {
                // Don't expose the store's raw wording to clients
                tracing::warn!("Store rejected request: {}", message);
                ApiError::bad_request("The data store rejected the request")
            }
            _ => {
                tracing::error!("Store error: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Empty => ApiError::bad_request("Password must not be empty"),
            PasswordError::Hash(msg) => {
                tracing::error!("Password hashing failed: {}", msg);
                ApiError::internal_server_error("Failed to store password")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
