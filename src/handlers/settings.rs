use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use super::users::role_field;
use super::utils::{id_value, require_fields};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Query, Row};

pub async fn show() -> Json<Value> {
    Json(json!({ "message": "System settings" }))
}

/// PUT /configuracion/cambiar-rol
///
/// The next request made by the affected user is authorized with the new role.
pub async fn change_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_fields(&body, &["id", "nuevoRol"])?;
    let id = id_value(body.get("id")).ok_or_else(|| ApiError::bad_request("id must be a numeric id"))?;
    let role = role_field(&body, "nuevoRol")?.ok_or_else(|| ApiError::missing_fields(["nuevoRol"]))?;

    let mut patch = Row::new();
    patch.insert("rol".into(), Value::from(role.label()));
    let updated = state.store.update(&Query::table("usuario").eq("id", id), patch).await?;
    if updated.is_empty() {
        return Err(ApiError::not_found("User not found"));
    }

    info!(by = principal.subject_id, user = id, role = %role, "role changed");
    Ok(Json(json!({ "message": "Role updated" })))
}
