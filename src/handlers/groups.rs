use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::utils::{collect_ids, id_value, owner_of, pick_fields, require_fields, rows_json, update_fields};
use crate::auth::{ensure_owner, Principal, Role, SubjectId};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Query, Row, TableStore};

const TABLE: &str = "grupo";
const MEMBERS: &str = "grupo_tecnico";

/// Ids of technicians in any group led by `supervisor`.
///
/// Each empty step is reported as its own 404, the way clients expect.
pub(crate) async fn supervised_technicians(
    store: &dyn TableStore,
    supervisor: SubjectId,
) -> Result<Vec<SubjectId>, ApiError> {
    let groups = store
        .select(&Query::table(TABLE).select(&["id"]).eq("id_supervisor", supervisor))
        .await?;
    if groups.is_empty() {
        return Err(ApiError::not_found("No groups found for this supervisor"));
    }

    let members = store
        .select(&Query::table(MEMBERS).select(&["id_tecnico"]).is_in("id_grupo", collect_ids(&groups, "id")))
        .await?;
    let technicians = collect_ids(&members, "id_tecnico");
    if technicians.is_empty() {
        return Err(ApiError::not_found("No technicians assigned to this supervisor's groups"));
    }
    Ok(technicians)
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.store.select(&Query::table(TABLE).order_asc("id")).await?;
    Ok(Json(rows_json(rows)))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let row = state
        .store
        .select_one(&Query::table(TABLE).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;
    Ok(Json(Value::Object(row)))
}

/// GET /grupos/tecnico/:id_tecnico: the technician's group and its supervisor.
pub async fn for_technician(
    State(state): State<AppState>,
    principal: Principal,
    Path(technician): Path<SubjectId>,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&principal, Some(technician))?;

    let membership = state
        .store
        .select_one(&Query::table(MEMBERS).select(&["id_grupo"]).eq("id_tecnico", technician))
        .await?
        .ok_or_else(|| ApiError::not_found("Technician does not belong to any group"))?;

    let group = state
        .store
        .select_one(&Query::table(TABLE).eq("id", membership.get("id_grupo").cloned().unwrap_or_default()))
        .await?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;

    let supervisor = state
        .store
        .select_one(
            &Query::table("usuario")
                .select(&["nombre"])
                .eq("id", group.get("id_supervisor").cloned().unwrap_or_default()),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Supervisor not found"))?;

    Ok(Json(json!({
        "id_grupo": group.get("id"),
        "nombre_grupo": group.get("nombre"),
        "descripcion": group.get("descripcion"),
        "supervisor": supervisor.get("nombre"),
    })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_fields(&body, &["nombre", "id_supervisor"])?;
    let row = pick_fields(&body, &["nombre", "descripcion", "id_supervisor"]);
    let created = state.store.insert(TABLE, vec![row]).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Group created", "data": rows_json(created) }))))
}

/// POST /grupos/:id/asignar-tecnico
pub async fn assign_technician(
    State(state): State<AppState>,
    Path(group): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_fields(&body, &["id_tecnico"])?;
    let technician = id_value(body.get("id_tecnico"))
        .ok_or_else(|| ApiError::bad_request("id_tecnico must be a numeric id"))?;

    let group_row = state.store.select_one(&Query::table(TABLE).select(&["id"]).eq("id", group)).await?;
    if group_row.is_none() {
        return Err(ApiError::not_found("Group not found"));
    }

    let technician_row = state
        .store
        .select_one(
            &Query::table("usuario")
                .select(&["id"])
                .eq("id", technician)
                .eq("rol", Role::Technician.label()),
        )
        .await?;
    if technician_row.is_none() {
        return Err(ApiError::not_found("Technician not found or user is not a technician"));
    }

    let existing = state
        .store
        .select_one(&Query::table(MEMBERS).eq("id_grupo", group).eq("id_tecnico", technician))
        .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Technician is already assigned to this group"));
    }

    let mut row = Row::new();
    row.insert("id_grupo".into(), Value::from(group));
    row.insert("id_tecnico".into(), Value::from(technician));
    state.store.insert(MEMBERS, vec![row]).await?;

    info!(group, technician, "technician assigned to group");
    Ok(Json(json!({ "message": "Technician assigned" })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let patch = update_fields(&body, &["nombre", "descripcion", "id_supervisor"])?;
    let updated = state.store.update(&Query::table(TABLE).eq("id", id), patch).await?;
    if updated.is_empty() {
        return Err(ApiError::not_found("Group not found"));
    }
    Ok(Json(json!({ "message": "Group updated", "data": rows_json(updated) })))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&Query::table(TABLE).eq("id", id)).await?;
    if removed == 0 {
        return Err(ApiError::not_found("Group not found"));
    }
    Ok(Json(json!({ "message": "Group deleted" })))
}

/// GET /grupos/:id/tecnicos-disponibles: technicians not yet in this group.
pub async fn available_technicians(
    State(state): State<AppState>,
    Path(group): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let members = state
        .store
        .select(&Query::table(MEMBERS).select(&["id_tecnico"]).eq("id_grupo", group))
        .await?;
    let assigned = collect_ids(&members, "id_tecnico");

    let technicians = state
        .store
        .select(&Query::table("usuario").select(&["id", "nombre", "correo"]).eq("rol", Role::Technician.label()))
        .await?;
    let available: Vec<Row> = technicians
        .into_iter()
        .filter(|t| !owner_of(t, "id").is_some_and(|id| assigned.contains(&id)))
        .collect();
    Ok(Json(rows_json(available)))
}

/// GET /grupos/supervisor/:id_supervisor/tecnicos
pub async fn supervisor_technicians(
    State(state): State<AppState>,
    Path(supervisor): Path<SubjectId>,
) -> Result<Json<Value>, ApiError> {
    let ids = supervised_technicians(state.store.as_ref(), supervisor).await?;
    let users = state
        .store
        .select(
            &Query::table("usuario")
                .select(&["id", "nombre"])
                .is_in("id", ids)
                .eq("rol", Role::Technician.label()),
        )
        .await?;
    if users.is_empty() {
        return Err(ApiError::not_found("No technicians found for the given ids"));
    }
    Ok(Json(rows_json(users)))
}

/// GET /grupos/:id/tecnicos
pub async fn members(State(state): State<AppState>, Path(group): Path<i64>) -> Result<Json<Value>, ApiError> {
    let links = state
        .store
        .select(&Query::table(MEMBERS).select(&["id_tecnico"]).eq("id_grupo", group))
        .await?;
    let ids = collect_ids(&links, "id_tecnico");
    if ids.is_empty() {
        return Err(ApiError::not_found("No technicians assigned to this group"));
    }

    let users = state
        .store
        .select(&Query::table("usuario").select(&["id", "nombre", "correo"]).is_in("id", ids))
        .await?;
    Ok(Json(rows_json(users)))
}

/// DELETE /grupos/:id/quitar-tecnico/:id_tecnico
pub async fn remove_technician(
    State(state): State<AppState>,
    Path((group, technician)): Path<(i64, SubjectId)>,
) -> Result<Json<Value>, ApiError> {
    let removed = state
        .store
        .delete(&Query::table(MEMBERS).eq("id_grupo", group).eq("id_tecnico", technician))
        .await?;
    info!(group, technician, removed, "technician removed from group");
    Ok(Json(json!({ "message": "Technician removed from group" })))
}
