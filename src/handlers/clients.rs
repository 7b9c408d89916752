use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::utils::{body_object, is_provided, pick_fields, rows_json, update_fields};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Query;

const TABLE: &str = "cliente";

#[derive(Debug, Default, Deserialize)]
pub struct ClientFilter {
    pub nombre: Option<String>,
    pub correo: Option<String>,
    pub fecha_registro: Option<String>,
}

impl ClientFilter {
    fn to_query(&self) -> Query {
        let mut query = Query::table(TABLE);
        if let Some(nombre) = self.nombre.as_deref().filter(|s| !s.is_empty()) {
            query = query.ilike("nombre", format!("%{}%", nombre));
        }
        if let Some(correo) = self.correo.as_deref().filter(|s| !s.is_empty()) {
            query = query.eq("correo", correo);
        }
        if let Some(since) = self.fecha_registro.as_deref().filter(|s| !s.is_empty()) {
            query = query.gte("fecha_registro", since);
        }
        query.order_asc("id")
    }
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<ClientFilter>,
) -> Result<Json<Value>, ApiError> {
    let rows = state.store.select(&filter.to_query()).await?;
    Ok(Json(rows_json(rows)))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let row = state
        .store
        .select_one(&Query::table(TABLE).eq("id", id))
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;
    Ok(Json(Value::Object(row)))
}

/// Clients must come with map coordinates; they are stored as a JSON string.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    body_object(&body)?;
    let location = body.get("ubicacion").filter(|v| v.is_object());
    let (lat, lng) = match location {
        Some(loc) if is_provided(&loc["lat"]) && is_provided(&loc["lng"]) => (loc["lat"].clone(), loc["lng"].clone()),
        _ => return Err(ApiError::bad_request("Location coordinates (ubicacion.lat, ubicacion.lng) are required")),
    };

    let mut row = pick_fields(&body, &["nombre", "correo", "telefono", "direccion"]);
    row.insert("ubicacion".into(), Value::from(json!({ "lat": lat, "lng": lng }).to_string()));
    row.insert("fecha_registro".into(), Value::from(Utc::now().to_rfc3339()));

    let created = state.store.insert(TABLE, vec![row]).await?;
    Ok((StatusCode::CREATED, Json(rows_json(created))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let patch = update_fields(&body, &["nombre", "direccion", "ubicacion", "telefono", "correo"])?;
    let updated = state.store.update(&Query::table(TABLE).eq("id", id), patch).await?;
    if updated.is_empty() {
        return Err(ApiError::not_found("Client not found"));
    }
    Ok(Json(json!({ "message": "Client updated", "data": rows_json(updated) })))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&Query::table(TABLE).eq("id", id)).await?;
    if removed == 0 {
        return Err(ApiError::not_found("Client not found"));
    }
    Ok(Json(json!({ "message": "Client deleted" })))
}
