//! Pooled connection handle for one physical database.
//!
//! # Responsibilities
//! - Own an r2d2 pool of sqlite connections for one datasource
//! - Bound the wait for a pooled connection and report exhaustion
//! - Materialize result rows as JSON objects
//!
//! # Design Decisions
//! - Connections are acquired per query call and returned on guard drop,
//!   so an aborted script never strands a connection
//! - Column keys optionally map `snake_case` → `camelCase` at the handle,
//!   keeping scripts free of driver concerns

use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

use crate::config::DataSourceConfig;
use crate::error::{ApiError, ApiResult};

/// A named datasource owning a pooled sqlite client.
pub struct DataSourceHandle {
    name: String,
    pool: Pool<SqliteConnectionManager>,
    camel_case_keys: bool,
}

impl DataSourceHandle {
    /// Open the database behind `config` and build its pool.
    ///
    /// `:memory:` opens one private in-memory database per pooled
    /// connection; file paths share one database across the pool.
    pub fn open(config: &DataSourceConfig, camel_case_keys: bool) -> ApiResult<Self> {
        let manager = if config.path == ":memory:" {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(&config.path)
        };

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .build(manager)
            .map_err(|e| {
                ApiError::QueryError(format!("failed to open datasource {}: {}", config.name, e))
            })?;

        tracing::info!(
            datasource = %config.name,
            path = %config.path,
            max_connections = config.max_connections,
            "datasource opened"
        );

        Ok(Self {
            name: config.name.clone(),
            pool,
            camel_case_keys,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to the configured bound for a pooled connection.
    fn acquire(&self) -> ApiResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|_| ApiError::PoolExhausted(self.name.clone()))
    }

    /// Run a query and materialize every row as a JSON object.
    pub fn query(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Vec<Value>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;

        let keys: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| {
                if self.camel_case_keys {
                    camel_case(name)
                } else {
                    (*name).to_string()
                }
            })
            .collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(query_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut object = Map::with_capacity(keys.len());
            for (i, key) in keys.iter().enumerate() {
                let value = row.get_ref(i).map_err(query_error)?;
                object.insert(key.clone(), column_to_json(value));
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }

    /// Run a query and return the first column of the first row, or null.
    pub fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Value> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(query_error)?;

        match rows.next().map_err(query_error)? {
            Some(row) => Ok(column_to_json(row.get_ref(0).map_err(query_error)?)),
            None => Ok(Value::Null),
        }
    }

    /// Run a statement and return the number of affected rows.
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> ApiResult<usize> {
        let conn = self.acquire()?;
        conn.execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(query_error)
    }

    /// Run an insert and return the last inserted rowid.
    pub fn insert(&self, sql: &str, params: &[SqlValue]) -> ApiResult<i64> {
        let conn = self.acquire()?;
        conn.execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(query_error)?;
        Ok(conn.last_insert_rowid())
    }

    /// (total, idle) connection counts; used by pool-invariant probes.
    pub fn pool_state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }
}

impl std::fmt::Debug for DataSourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceHandle")
            .field("name", &self.name)
            .field("camel_case_keys", &self.camel_case_keys)
            .finish()
    }
}

fn query_error(e: rusqlite::Error) -> ApiError {
    ApiError::QueryError(e.to_string())
}

fn column_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|&byte| Value::Number(byte.into())).collect()),
    }
}

/// `user_name` → `userName`; keys without underscores pass through as-is.
fn camel_case(column: &str) -> String {
    if !column.contains('_') {
        return column.to_string();
    }
    let lower = column.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut upper_next = false;
    for ch in lower.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
