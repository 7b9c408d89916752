use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::utils::{owner_of, pick_fields, require_fields, rows_json, update_fields};
use crate::auth::{ensure_owner, Principal, SubjectId};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Query;

const TABLE: &str = "visita";
const FIELDS: &[&str] = &[
    "id_cliente",
    "id_tecnico",
    "id_supervisor",
    "motivo",
    "tipo_servicio",
    "fecha",
    "ubicacion",
    "estado",
    "observaciones",
];

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.store.select(&Query::table(TABLE).order_asc("id")).await?;
    Ok(Json(rows_json(rows)))
}

/// Technicians only see visits assigned to them.
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let row = state
        .store
        .select_one(&Query::table(TABLE).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("Visit not found"))?;
    ensure_owner(&principal, owner_of(&row, "id_tecnico"))?;
    Ok(Json(Value::Object(row)))
}

pub async fn for_technician(
    State(state): State<AppState>,
    principal: Principal,
    Path(technician): Path<SubjectId>,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&principal, Some(technician))?;
    let rows = state
        .store
        .select(&Query::table(TABLE).eq("id_tecnico", technician).order_asc("fecha"))
        .await?;
    Ok(Json(rows_json(rows)))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_fields(&body, &["id_cliente", "id_tecnico", "id_supervisor", "fecha"])?;
    let created = state.store.insert(TABLE, vec![pick_fields(&body, FIELDS)]).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Visit created", "data": rows_json(created) }))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let patch = update_fields(&body, FIELDS)?;
    let updated = state.store.update(&Query::table(TABLE).eq("id", id), patch).await?;
    if updated.is_empty() {
        return Err(ApiError::not_found("Visit not found"));
    }
    Ok(Json(json!({ "message": "Visit updated", "data": rows_json(updated) })))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&Query::table(TABLE).eq("id", id)).await?;
    if removed == 0 {
        return Err(ApiError::not_found("Visit not found"));
    }
    Ok(Json(json!({ "message": "Visit deleted" })))
}
