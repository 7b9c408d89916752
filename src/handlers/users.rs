use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::utils::{body_object, collect_ids, pick_fields, require_fields, rows_json};
use crate::auth::{password::hash_password, Principal, Role, SubjectId};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Query, Row};

const TABLE: &str = "usuario";
const PUBLIC_COLUMNS: &[&str] = &["id", "nombre", "correo", "telefono", "rol"];

fn without_password(mut row: Row) -> Value {
    row.remove("password");
    Value::Object(row)
}

/// Parse an optional `rol` label, rejecting anything outside the known set.
pub(crate) fn role_field(body: &Value, field: &str) -> Result<Option<Role>, ApiError> {
    match body.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(label) => label
            .parse::<Role>()
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("Invalid role: {}", e.0))),
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.store.select(&Query::table(TABLE).select(PUBLIC_COLUMNS).order_asc("id")).await?;
    Ok(Json(rows_json(rows)))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<SubjectId>) -> Result<Json<Value>, ApiError> {
    let row = state
        .store
        .select_one(&Query::table(TABLE).select(PUBLIC_COLUMNS).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(Value::Object(row)))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_fields(&body, &["nombre", "correo", "telefono", "password"])?;
    let role = role_field(&body, "rol")?.unwrap_or(Role::Technician);
    let correo = body["correo"].as_str().unwrap_or_default();

    let existing = state
        .store
        .select_one(&Query::table(TABLE).select(&["id"]).eq("correo", correo))
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let mut row = pick_fields(&body, &["nombre", "correo", "telefono"]);
    let password = body["password"].as_str().unwrap_or_default();
    row.insert("password".into(), Value::from(hash_password(password)?));
    row.insert("rol".into(), Value::from(role.label()));

    let created = state.store.insert(TABLE, vec![row]).await?;
    info!(by = principal.subject_id, role = %role, "user created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created",
            "data": created.into_iter().map(without_password).collect::<Vec<_>>(),
        })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<SubjectId>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    body_object(&body)?;
    let mut patch = pick_fields(&body, &["nombre", "correo", "telefono"]);
    if let Some(role) = role_field(&body, "rol")? {
        patch.insert("rol".into(), Value::from(role.label()));
    }
    if let Some(password) = body.get("password").and_then(Value::as_str).filter(|p| !p.is_empty()) {
        patch.insert("password".into(), Value::from(hash_password(password)?));
    }
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields provided to update"));
    }

    let updated = state.store.update(&Query::table(TABLE).eq("id", id), patch).await?;
    if updated.is_empty() {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({
        "message": "User updated",
        "data": updated.into_iter().map(without_password).collect::<Vec<_>>(),
    })))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<SubjectId>) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&Query::table(TABLE).eq("id", id)).await?;
    if removed == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({ "message": "User deleted" })))
}

/// GET /usuarios/tecnicos-disponibles: technicians not in any group.
pub async fn available_technicians(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let technicians = state
        .store
        .select(&Query::table(TABLE).select(&["id", "nombre", "correo"]).eq("rol", Role::Technician.label()))
        .await?;
    let assignments = state.store.select(&Query::table("grupo_tecnico").select(&["id_tecnico"])).await?;
    let assigned = collect_ids(&assignments, "id_tecnico");

    let available: Vec<Row> = technicians
        .into_iter()
        .filter(|t| !super::utils::owner_of(t, "id").is_some_and(|id| assigned.contains(&id)))
        .collect();
    Ok(Json(rows_json(available)))
}
