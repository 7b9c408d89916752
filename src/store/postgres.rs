use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row as _};
use tracing::info;

use super::{scalar_text, validate_identifier, Filter, Query, Row, StoreError, TableStore};

/// Direct connection to the database behind the hosted table API.
pub struct PostgresStore {
    pool: PgPool,
}

/// SQL text plus its positional parameters.
#[derive(Debug, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Param {
    Text(Option<String>),
    TextArray(Vec<String>),
    Json(Value),
}

impl PostgresStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Io(e) => StoreError::Unavailable(e.to_string()),
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".to_string()),
            other => StoreError::Database(other),
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// WHERE clause over `filters`, numbering parameters from `first`.
fn where_clause(
    filters: &[Filter],
    qualifier: Option<&str>,
    first: usize,
    params: &mut Vec<Param>,
) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let column = |name: &str| match qualifier {
        Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(name)),
        None => quote_identifier(name),
    };

    let mut clauses = Vec::with_capacity(filters.len());
    for (offset, filter) in filters.iter().enumerate() {
        let n = first + offset;
        let col = column(filter.column());
        match filter {
            Filter::Eq(_, value) => match scalar_text(value) {
                Some(text) => {
                    clauses.push(format!("{}::text = ${}", col, n));
                    params.push(Param::Text(Some(text)));
                }
                None => {
                    clauses.push(format!("({} IS NULL AND ${}::text IS NULL)", col, n));
                    params.push(Param::Text(None));
                }
            },
            Filter::ILike(_, pattern) => {
                clauses.push(format!("{}::text ILIKE ${}", col, n));
                params.push(Param::Text(Some(pattern.clone())));
            }
            Filter::Gte(_, value) => {
                // Compared as text; callers only use ISO dates here.
                clauses.push(format!("{}::text >= ${}", col, n));
                params.push(Param::Text(scalar_text(value)));
            }
            Filter::In(_, values) => {
                clauses.push(format!("{}::text = ANY(${})", col, n));
                params.push(Param::TextArray(values.iter().filter_map(scalar_text).collect()));
            }
        }
    }
    format!(" WHERE {}", clauses.join(" AND "))
}

pub(crate) fn build_select(query: &Query) -> Result<Statement, StoreError> {
    query.validate()?;
    let columns = match &query.columns {
        Some(cols) if !cols.iter().any(|c| c == "*") => {
            cols.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ")
        }
        _ => "*".to_string(),
    };

    let mut params = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", columns, quote_identifier(&query.table));
    sql.push_str(&where_clause(&query.filters, None, 1, &mut params));
    if let Some(order) = &query.order {
        let direction = if order.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {}", quote_identifier(&order.column), direction));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(Statement {
        sql: format!("SELECT row_to_json(t) AS row FROM ({}) t", sql),
        params,
    })
}

pub(crate) fn build_insert(table: &str, row: &Row) -> Result<Statement, StoreError> {
    validate_identifier(table)?;
    for key in row.keys() {
        validate_identifier(key)?;
    }
    let table_q = quote_identifier(table);
    let returning = format!("RETURNING row_to_json({}) AS row", table_q);

    let sql = if row.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES {}", table_q, returning)
    } else {
        let columns = row.keys().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ");
        format!(
            "INSERT INTO {t} ({c}) SELECT {c} FROM json_populate_record(NULL::{t}, $1::json) {r}",
            t = table_q,
            c = columns,
            r = returning
        )
    };
    let params = if row.is_empty() { vec![] } else { vec![Param::Json(Value::Object(row.clone()))] };
    Ok(Statement { sql, params })
}

pub(crate) fn build_update(query: &Query, patch: &Row) -> Result<Statement, StoreError> {
    query.validate()?;
    if patch.is_empty() {
        return Err(StoreError::Rejected { status: 400, message: "empty update".to_string() });
    }
    for key in patch.keys() {
        validate_identifier(key)?;
    }

    let table_q = quote_identifier(&query.table);
    let assignments = patch
        .keys()
        .map(|c| format!("{} = src.{}", quote_identifier(c), quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = vec![Param::Json(Value::Object(patch.clone()))];
    let filters = where_clause(&query.filters, Some(&query.table), 2, &mut params);
    let sql = format!(
        "UPDATE {t} SET {a} FROM json_populate_record(NULL::{t}, $1::json) AS src{w} RETURNING row_to_json({t}) AS row",
        t = table_q,
        a = assignments,
        w = filters
    );
    Ok(Statement { sql, params })
}

pub(crate) fn build_delete(query: &Query) -> Result<Statement, StoreError> {
    query.validate()?;
    let mut params = Vec::new();
    let filters = where_clause(&query.filters, None, 1, &mut params);
    Ok(Statement {
        sql: format!("DELETE FROM {}{}", quote_identifier(&query.table), filters),
        params,
    })
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [Param],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for param in params {
        q = match param {
            Param::Text(text) => q.bind(text.as_deref()),
            Param::TextArray(items) => q.bind(items.as_slice()),
            Param::Json(value) => q.bind(value),
        };
    }
    q
}

async fn fetch_rows(pool: &PgPool, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    let rows = bind_params(sqlx::query(&statement.sql), &statement.params)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|r| match r.try_get::<Value, _>("row")? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Decode(format!("expected object row, got {}", other))),
        })
        .collect()
}

#[async_trait]
impl TableStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let statement = build_select(query)?;
        fetch_rows(&self.pool, &statement).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in &rows {
            let statement = build_insert(table, row)?;
            let record = bind_params(sqlx::query(&statement.sql), &statement.params)
                .fetch_one(&mut *tx)
                .await?;
            match record.try_get::<Value, _>("row")? {
                Value::Object(map) => inserted.push(map),
                other => return Err(StoreError::Decode(format!("expected object row, got {}", other))),
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        let statement = build_update(query, &patch)?;
        fetch_rows(&self.pool, &statement).await
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        let statement = build_delete(query)?;
        let result = bind_params(sqlx::query(&statement.sql), &statement.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_wraps_projection_in_row_to_json() {
        let query = Query::table("usuario").select(&["rol"]).eq("id", 42).limit(1);
        let statement = build_select(&query).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT row_to_json(t) AS row FROM (SELECT \"rol\" FROM \"usuario\" WHERE \"id\"::text = $1 LIMIT 1) t"
        );
        assert_eq!(statement.params, vec![Param::Text(Some("42".to_string()))]);
    }

    #[test]
    fn select_numbers_every_filter_and_orders() {
        let query = Query::table("reporte")
            .is_in("id_tecnico", [3, 4])
            .gte("horaInicio", "2024-05-01")
            .ilike("descripcion", "%fuga%")
            .order_desc("horaInicio");
        let statement = build_select(&query).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"reporte\" WHERE \"id_tecnico\"::text = ANY($1) \
             AND \"horaInicio\"::text >= $2 AND \"descripcion\"::text ILIKE $3 ORDER BY \"horaInicio\" DESC) t"
        );
        assert_eq!(
            statement.params,
            vec![
                Param::TextArray(vec!["3".into(), "4".into()]),
                Param::Text(Some("2024-05-01".into())),
                Param::Text(Some("%fuga%".into())),
            ]
        );
    }

    #[test]
    fn insert_populates_from_json_record() {
        let row = json!({"id_supervisor": 3, "nombre": "Norte"}).as_object().cloned().unwrap();
        let statement = build_insert("grupo", &row).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"grupo\" (\"id_supervisor\", \"nombre\") SELECT \"id_supervisor\", \"nombre\" \
             FROM json_populate_record(NULL::\"grupo\", $1::json) RETURNING row_to_json(\"grupo\") AS row"
        );
        assert_eq!(statement.params, vec![Param::Json(Value::Object(row))]);
    }

    #[test]
    fn update_qualifies_filters_after_the_patch_parameter() {
        let patch = json!({"rol": "Supervisor"}).as_object().cloned().unwrap();
        let statement = build_update(&Query::table("usuario").eq("id", 7), &patch).unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"usuario\" SET \"rol\" = src.\"rol\" FROM json_populate_record(NULL::\"usuario\", $1::json) AS src \
             WHERE \"usuario\".\"id\"::text = $2 RETURNING row_to_json(\"usuario\") AS row"
        );
        assert_eq!(statement.params.len(), 2);

        assert!(build_update(&Query::table("usuario"), &Row::new()).is_err());
    }

    #[test]
    fn delete_and_rejected_identifiers() {
        let statement = build_delete(&Query::table("grupo_tecnico").eq("id_grupo", 1).eq("id_tecnico", 2)).unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM \"grupo_tecnico\" WHERE \"id_grupo\"::text = $1 AND \"id_tecnico\"::text = $2"
        );

        let bad = json!({"x\" = 1; --": 1}).as_object().cloned().unwrap();
        assert!(matches!(build_insert("usuario", &bad), Err(StoreError::InvalidIdentifier(_))));
    }
}
