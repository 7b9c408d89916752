use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use url::Url;

use super::groups::supervised_technicians;
use super::utils::{id_value, owner_of, pick_fields, require_fields, rows_json};
use crate::auth::{ensure_owner, Principal, Role, SubjectId};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Query;

const TABLE: &str = "reporte";
const REQUIRED: &[&str] = &["id_visita", "id_tecnico", "id_supervisor", "horaInicio", "horaFin", "descripcion", "estado"];
const TECHNICIAN_EDITABLE: &[&str] = &["horaInicio", "horaFin", "descripcion", "evidencia"];
const EDITABLE: &[&str] = &["horaInicio", "horaFin", "descripcion", "estado", "evidencia"];

/// Evidence is a link to an already uploaded photo.
fn evidence_url(body: &Value) -> Result<Option<String>, ApiError> {
    match body.get("evidencia").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(url.to_string())),
            _ => Err(ApiError::bad_request("evidencia must be an http(s) URL")),
        },
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.store.select(&Query::table(TABLE).order_desc("horaInicio")).await?;
    Ok(Json(rows_json(rows)))
}

/// Technicians file reports for themselves only.
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_fields(&body, REQUIRED)?;
    ensure_owner(&principal, id_value(body.get("id_tecnico")))?;
    let evidence = evidence_url(&body)?;

    let mut row = pick_fields(&body, REQUIRED);
    row.insert("evidencia".into(), evidence.map(Value::from).unwrap_or(Value::Null));

    let created = state.store.insert(TABLE, vec![row]).await?;
    let report = created
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::internal_server_error("Report was not stored"))?;
    Ok((StatusCode::CREATED, Json(Value::Object(report))))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&Query::table(TABLE).eq("id", id)).await?;
    if removed == 0 {
        return Err(ApiError::not_found("Report not found"));
    }
    Ok(Json(json!({ "message": "Report deleted" })))
}

pub async fn for_technician(
    State(state): State<AppState>,
    principal: Principal,
    Path(technician): Path<SubjectId>,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&principal, Some(technician))?;
    let rows = state
        .store
        .select(&Query::table(TABLE).eq("id_tecnico", technician).order_desc("horaInicio"))
        .await?;
    Ok(Json(rows_json(rows)))
}

/// GET /reportes/supervisor/:id_supervisor/reportes
pub async fn for_supervisor(
    State(state): State<AppState>,
    Path(supervisor): Path<SubjectId>,
) -> Result<Json<Value>, ApiError> {
    let technicians = supervised_technicians(state.store.as_ref(), supervisor).await?;
    let rows = state
        .store
        .select(&Query::table(TABLE).is_in("id_tecnico", technicians).order_desc("horaInicio"))
        .await?;
    if rows.is_empty() {
        return Err(ApiError::not_found("No reports found for this supervisor's technicians"));
    }
    Ok(Json(rows_json(rows)))
}

pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let row = state
        .store
        .select_one(&Query::table(TABLE).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    ensure_owner(&principal, owner_of(&row, "id_tecnico"))?;
    Ok(Json(Value::Object(row)))
}

/// Technicians edit times, description and evidence of their own reports;
/// supervisors move the `estado` along.
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    match principal.role {
        Role::Technician if pick_fields(&body, TECHNICIAN_EDITABLE).is_empty() => {
            return Err(ApiError::bad_request("At least one field other than estado must be updated"));
        }
        Role::Supervisor if pick_fields(&body, &["estado"]).is_empty() => {
            return Err(ApiError::bad_request("Supervisors must provide estado"));
        }
        _ => {}
    }

    let current = state
        .store
        .select_one(&Query::table(TABLE).select(&["id_tecnico"]).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    ensure_owner(&principal, owner_of(&current, "id_tecnico"))?;

    let allowed = if principal.role == Role::Technician { TECHNICIAN_EDITABLE } else { EDITABLE };
    let mut patch = pick_fields(&body, allowed);
    if patch.contains_key("evidencia") {
        if let Some(url) = evidence_url(&body)? {
            patch.insert("evidencia".into(), Value::from(url));
        }
    }
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields provided to update"));
    }

    let updated = state.store.update(&Query::table(TABLE).eq("id", id), patch).await?;
    let report = updated
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    Ok(Json(Value::Object(report)))
}
