use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::utils::{id_value, require_fields};
use crate::auth::{
    password::{hash_password, needs_upgrade, verify_password},
    Role, SubjectId,
};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Query, Row};

/// POST /api/login
///
/// Exchanges `correo` + `password` for a signed token. The token's role claim
/// is a convenience copy; authorization always re-reads the stored role.
pub async fn login(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    require_fields(&body, &["correo", "password"])?;
    let correo = body["correo"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let user = state
        .store
        .select_one(&Query::table("usuario").select(&["id", "rol", "password"]).eq("correo", correo))
        .await?
        .ok_or_else(|| {
            warn!(correo, "login for unknown email");
            ApiError::unauthorized("Invalid email or password")
        })?;

    let stored = user.get("password").and_then(Value::as_str).unwrap_or_default();
    if !verify_password(password, stored) {
        warn!(correo, "login with wrong password");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let subject = id_value(user.get("id"))
        .ok_or_else(|| ApiError::internal_server_error("User record has no usable id"))?;
    if needs_upgrade(stored) {
        upgrade_hash(&state, subject, password).await;
    }
    let role_hint = user.get("rol").and_then(Value::as_str).and_then(|label| label.parse::<Role>().ok());

    let token = state.tokens.issue(subject, role_hint)?;
    info!(subject, "issued token");
    Ok(Json(json!({ "token": token })))
}

/// Replace a legacy bcrypt hash with argon2. Failures only cost another try at the next login.
async fn upgrade_hash(state: &AppState, subject: SubjectId, password: &str) {
    let hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(subject, error = %e, "could not rehash legacy password");
            return;
        }
    };
    let mut patch = Row::new();
    patch.insert("password".into(), Value::from(hash));
    match state.store.update(&Query::table("usuario").eq("id", subject), patch).await {
        Ok(_) => info!(subject, "legacy password hash upgraded"),
        Err(e) => warn!(subject, error = %e, "could not store upgraded password hash"),
    }
}
