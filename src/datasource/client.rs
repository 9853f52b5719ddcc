//! Script-facing database client.
//!
//! One `DbClient` is constructed per dispatch and injected into the script
//! scope as `db`. It binds the endpoint's datasource, the shared result
//! cache and the request's page window; `cache(..)` and `source(..)` return
//! modified views without mutating the original, so bindings never leak
//! between concurrent invocations.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::cache::SqlCache;
use crate::datasource::handle::DataSourceHandle;
use crate::datasource::router::DataSourceRouter;
use crate::error::{ApiError, ApiResult};
use crate::provider::{PageProvider, PageRequest};

#[derive(Clone, Default)]
enum CacheMode {
    /// Reads go straight to the database.
    #[default]
    Off,
    /// Reads go through the cache with its default TTL.
    DefaultTtl,
    /// Reads go through the cache with an explicit TTL
    /// (zero pins the entry until capacity evicts it).
    Ttl(Duration),
}

/// Query surface exposed to scripts as `db`.
#[derive(Clone)]
pub struct DbClient {
    handle: Arc<DataSourceHandle>,
    router: Arc<DataSourceRouter>,
    cache: Arc<SqlCache>,
    page_provider: Arc<dyn PageProvider>,
    page_request: PageRequest,
    cache_mode: CacheMode,
}

impl DbClient {
    pub fn new(
        handle: Arc<DataSourceHandle>,
        router: Arc<DataSourceRouter>,
        cache: Arc<SqlCache>,
        page_provider: Arc<dyn PageProvider>,
        page_request: PageRequest,
    ) -> Self {
        Self {
            handle,
            router,
            cache,
            page_provider,
            page_request,
            cache_mode: CacheMode::Off,
        }
    }

    /// A view whose reads go through the result cache.
    /// `ttl` of `None` uses the cache's default TTL.
    pub fn with_cache(&self, ttl: Option<Duration>) -> Self {
        let mut client = self.clone();
        client.cache_mode = match ttl {
            None => CacheMode::DefaultTtl,
            Some(ttl) => CacheMode::Ttl(ttl),
        };
        client
    }

    /// A view bound to another named datasource.
    pub fn with_source(&self, name: &str) -> ApiResult<Self> {
        let mut client = self.clone();
        client.handle = self.router.get(Some(name))?;
        Ok(client)
    }

    /// All rows as a JSON array of objects.
    pub fn select(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Value> {
        self.cached("rows", sql, params, || {
            Ok(Value::Array(self.handle.query(sql, params)?))
        })
    }

    /// First row as a JSON object, or null when the result set is empty.
    pub fn select_one(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Value> {
        let rows = self.select(sql, params)?;
        match rows {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            _ => Ok(Value::Null),
        }
    }

    /// First column of the first row, or null.
    pub fn select_value(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Value> {
        self.cached("value", sql, params, || self.handle.query_scalar(sql, params))
    }

    /// First column of the first row coerced to an integer; null and
    /// non-numeric values coerce to an error.
    pub fn select_int(&self, sql: &str, params: &[SqlValue]) -> ApiResult<i64> {
        match self.select_value(sql, params)? {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| ApiError::QueryError(format!("non-integer result for: {}", sql))),
            Value::String(s) => s
                .parse()
                .map_err(|_| ApiError::QueryError(format!("non-integer result for: {}", sql))),
            other => Err(ApiError::QueryError(format!(
                "expected integer, got {} for: {}",
                other, sql
            ))),
        }
    }

    /// Affected row count. Never consults the cache.
    pub fn update(&self, sql: &str, params: &[SqlValue]) -> ApiResult<usize> {
        self.handle.execute(sql, params)
    }

    /// Insert returning the last inserted rowid. Never consults the cache.
    pub fn insert(&self, sql: &str, params: &[SqlValue]) -> ApiResult<i64> {
        self.handle.insert(sql, params)
    }

    /// Count + windowed rows, shaped by the page provider with the page
    /// window extracted from the request.
    pub fn page(&self, sql: &str, params: &[SqlValue]) -> ApiResult<Value> {
        let base = sql.trim().trim_end_matches(';');
        let count_sql = format!("SELECT COUNT(*) FROM ({}) paged", base);
        let total = match self.cached("value", &count_sql, params, || {
            self.handle.query_scalar(&count_sql, params)
        })? {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        let window_sql = format!("{} LIMIT ? OFFSET ?", base);
        let mut window_params = params.to_vec();
        window_params.push(SqlValue::Integer(self.page_request.limit() as i64));
        window_params.push(SqlValue::Integer(self.page_request.offset() as i64));

        let rows = self.cached("rows", &window_sql, &window_params, || {
            Ok(Value::Array(self.handle.query(&window_sql, &window_params)?))
        })?;

        Ok(self.page_provider.wrap_page(total, rows, &self.page_request))
    }

    fn cached<F>(&self, op: &str, sql: &str, params: &[SqlValue], compute: F) -> ApiResult<Value>
    where
        F: FnOnce() -> ApiResult<Value>,
    {
        match self.cache_mode {
            CacheMode::Off => compute(),
            CacheMode::DefaultTtl => {
                let key = fingerprint(self.handle.name(), op, sql, params);
                self.cache.get_or_compute(&key, None, compute)
            }
            CacheMode::Ttl(ttl) => {
                let key = fingerprint(self.handle.name(), op, sql, params);
                self.cache.get_or_compute(&key, Some(ttl), compute)
            }
        }
    }
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("datasource", &self.handle.name())
            .field("page_request", &self.page_request)
            .finish()
    }
}

/// Cache key binding the datasource, operation shape, resolved SQL text
/// and the typed parameter values. Parameters are rendered with a type tag
/// so `1` and `"1"` never produce the same key.
fn fingerprint(source: &str, op: &str, sql: &str, params: &[SqlValue]) -> String {
    use std::fmt::Write;

    let mut key = String::with_capacity(source.len() + sql.len() + params.len() * 8 + 8);
    key.push_str(source);
    key.push('\u{2}');
    key.push_str(op);
    key.push('\u{2}');
    key.push_str(sql);
    for param in params {
        key.push('\u{1}');
        match param {
            SqlValue::Null => key.push('~'),
            SqlValue::Integer(i) => {
                let _ = write!(key, "i:{}", i);
            }
            SqlValue::Real(f) => {
                let _ = write!(key, "f:{}", f);
            }
            SqlValue::Text(t) => {
                let _ = write!(key, "s:{}", t);
            }
            SqlValue::Blob(b) => {
                key.push_str("b:");
                for byte in b {
                    let _ = write!(key, "{:02x}", byte);
                }
            }
        }
    }
    key
}
