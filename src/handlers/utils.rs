use serde_json::{Map, Value};

use crate::auth::SubjectId;
use crate::error::ApiError;
use crate::store::Row;

/// A value counts as provided when it is not null, empty text or `false`.
pub fn is_provided(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn body_object(body: &Value) -> Result<&Map<String, Value>, ApiError> {
    body.as_object()
        .ok_or_else(|| ApiError::bad_request("Request body must be a JSON object"))
}

/// Fail with the list of `fields` missing from `body`.
pub fn require_fields(body: &Value, fields: &[&str]) -> Result<(), ApiError> {
    let object = body_object(body)?;
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !object.get(*f).map(is_provided).unwrap_or(false))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::missing_fields(missing))
    }
}

/// Copy the provided `fields` of `body` into a new row.
pub fn pick_fields(body: &Value, fields: &[&str]) -> Row {
    let mut row = Row::new();
    if let Some(object) = body.as_object() {
        for field in fields {
            if let Some(value) = object.get(*field).filter(|v| is_provided(v)) {
                row.insert(field.to_string(), value.clone());
            }
        }
    }
    row
}

/// Like [`pick_fields`], but an empty result is a client error.
pub fn update_fields(body: &Value, fields: &[&str]) -> Result<Row, ApiError> {
    body_object(body)?;
    let row = pick_fields(body, fields);
    if row.is_empty() {
        return Err(ApiError::bad_request("No fields provided to update"));
    }
    Ok(row)
}

/// Read an id stored either as a JSON number or a numeric string.
pub fn id_value(value: Option<&Value>) -> Option<SubjectId> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn owner_of(row: &Row, column: &str) -> Option<SubjectId> {
    id_value(row.get(column))
}

/// Distinct ids found under `column` across `rows`.
pub fn collect_ids(rows: &[Row], column: &str) -> Vec<SubjectId> {
    let mut ids: Vec<SubjectId> = rows.iter().filter_map(|r| owner_of(r, column)).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub fn rows_json(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}
