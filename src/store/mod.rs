//! Table-oriented persistence used by the verifier and the route handlers.
//!
//! Rows are untyped JSON objects. A [`Query`] names a table plus the
//! filters, projection, ordering and limit the hosted query API supports,
//! and every backend translates the same `Query` into its own wire format.

pub mod memory;
pub mod postgres;
pub mod postgrest;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use postgrest::PostgrestStore;

/// One table row as returned by the store.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request timed out")]
    Timeout,

    #[error("conflicting row: {0}")]
    Conflict(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected store response: {0}")]
    Decode(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Failures of the transport rather than of the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// SQL `ILIKE` pattern using `%` wildcards.
    ILike(String, String),
    Gte(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::ILike(c, _) | Filter::Gte(c, _) | Filter::In(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            columns: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.into(), pattern.into()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn is_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order { column: column.into(), descending: false });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order { column: column.into(), descending: true });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check every table and column name before it reaches a backend.
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_identifier(&self.table)?;
        for column in self.columns.iter().flatten() {
            validate_identifier(column)?;
        }
        for filter in &self.filters {
            validate_identifier(filter.column())?;
        }
        if let Some(order) = &self.order {
            validate_identifier(&order.column)?;
        }
        Ok(())
    }
}

/// Table and column names are plain ASCII identifiers (`horaInicio`, `id_tecnico`).
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Text form of a scalar used for filter values. `None` for JSON null.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Short backend name used in logs and `/health`.
    fn backend(&self) -> &'static str;

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    async fn select_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        let query = query.clone().limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    /// Insert rows and return them as stored, generated ids included.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    /// Patch every row matching `query` and return the updated rows.
    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError>;

    /// Delete every row matching `query`, returning how many went away.
    async fn delete(&self, query: &Query) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
