use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{scalar_text, Filter, Query, Row, StoreError, TableStore};

/// In-process table store.
///
/// Backs local demos and the test suite. Besides plain storage it counts
/// selects per table and can simulate a slow or unreachable backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    selects: Mutex<HashMap<String, usize>>,
    latency_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with JSON objects. Non-object values are ignored.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect::<Vec<_>>();
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// Number of selects issued against `table` so far.
    pub fn select_count(&self, table: &str) -> usize {
        self.selects
            .lock()
            .map(|counts| counts.get(table).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, AtomicOrdering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    async fn simulate_backend(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(AtomicOrdering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn record_select(&self, table: &str) {
        if let Ok(mut counts) = self.selects.lock() {
            *counts.entry(table.to_string()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        query.validate()?;
        self.record_select(&query.table);
        self.simulate_backend().await?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| matches_all(row, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = &query.columns {
            rows = rows.into_iter().map(|row| project(row, columns)).collect();
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        super::validate_identifier(table)?;
        self.simulate_backend().await?;

        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        let mut next_id = stored
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;

        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if !row.contains_key("id") {
                row.insert("id".to_string(), Value::from(next_id));
                next_id += 1;
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        query.validate()?;
        self.simulate_backend().await?;

        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| matches_all(row, &query.filters)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        query.validate()?;
        self.simulate_backend().await?;

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches_all(row, &query.filters));
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.simulate_backend().await
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(row, filter))
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, value) => loosely_equal(cell, value),
        Filter::In(_, values) => values.iter().any(|v| loosely_equal(cell, v)),
        Filter::Gte(_, value) => {
            !cell.is_null() && compare_values(Some(cell), Some(value)) != Ordering::Less
        }
        Filter::ILike(_, pattern) => match scalar_text(cell) {
            Some(text) => ilike(&text, pattern),
            None => false,
        },
    }
}

/// Ids arrive as path strings and are stored as numbers; compare their text.
fn loosely_equal(cell: &Value, value: &Value) -> bool {
    match (scalar_text(cell), scalar_text(value)) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => scalar_text(a).cmp(&scalar_text(b)),
    }
}

fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let mut rest = text.as_str();
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn project(row: Row, columns: &[String]) -> Row {
    if columns.iter().any(|c| c == "*") {
        return row;
    }
    row.into_iter().filter(|(key, _)| columns.contains(key)).collect()
}
