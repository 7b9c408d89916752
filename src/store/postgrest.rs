use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{scalar_text, Filter, Query, Row, StoreError, TableStore};

/// Client for the hosted table API (`{base}/rest/v1/{table}`).
pub struct PostgrestStore {
    client: Client,
    rest_url: Url,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store url '{}': {}", base_url, e)))?;
        let rest_url = base
            .join("rest/v1/")
            .map_err(|e| StoreError::Unavailable(format!("invalid store url '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            rest_url,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, table: &str) -> Result<Url, StoreError> {
        super::validate_identifier(table)?;
        self.rest_url
            .join(table)
            .map_err(|e| StoreError::InvalidIdentifier(format!("{}: {}", table, e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout
            } else {
                StoreError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        tracing::debug!(status = status.as_u16(), %message, "table api rejected request");
        Err(match status {
            StatusCode::CONFLICT => StoreError::Conflict(message),
            s if s.is_server_error() => StoreError::Unavailable(format!("{}: {}", s, message)),
            s => StoreError::Rejected { status: s.as_u16(), message },
        })
    }

    async fn rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(StoreError::Decode(format!("expected object row, got {}", other))),
                })
                .collect(),
            other => Err(StoreError::Decode(format!("expected array of rows, got {}", other))),
        }
    }
}

/// Query-string pairs for a read or a filtered write.
pub(crate) fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(columns) = &query.columns {
        pairs.push(("select".to_string(), columns.join(",")));
    }
    for filter in &query.filters {
        let value = match filter {
            Filter::Eq(_, v) => match scalar_text(v) {
                Some(text) => format!("eq.{}", text),
                None => "is.null".to_string(),
            },
            Filter::ILike(_, pattern) => format!("ilike.{}", pattern.replace('%', "*")),
            Filter::Gte(_, v) => format!("gte.{}", scalar_text(v).unwrap_or_default()),
            Filter::In(_, values) => {
                let items: Vec<String> = values.iter().filter_map(scalar_text).map(|t| list_item(&t)).collect();
                format!("in.({})", items.join(","))
            }
        };
        pairs.push((filter.column().to_string(), value));
    }
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}

/// `in.(...)` items containing reserved characters must be double-quoted.
fn list_item(text: &str) -> String {
    if text.contains(|c: char| matches!(c, ',' | '(' | ')' | '"' | ' ')) {
        format!("\"{}\"", text.replace('"', "\\\""))
    } else {
        text.to_string()
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl TableStore for PostgrestStore {
    fn backend(&self) -> &'static str {
        "postgrest"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        query.validate()?;
        let request = self.client.get(self.endpoint(&query.table)?).query(&query_pairs(query));
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let request = self
            .client
            .post(self.endpoint(table)?)
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        query.validate()?;
        let request = self
            .client
            .patch(self.endpoint(&query.table)?)
            .query(&query_pairs(query))
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(request).await?;
        Self::rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        query.validate()?;
        let request = self
            .client
            .delete(self.endpoint(&query.table)?)
            .query(&query_pairs(query))
            .header("Prefer", "return=representation");
        let response = self.send(request).await?;
        Ok(Self::rows(response).await?.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let request = self.client.get(self.rest_url.clone());
        self.send(request).await.map(|_| ())
    }
}
