//! Error taxonomy for the dispatch pipeline.
//!
//! # Responsibilities
//! - Define the error kinds every subsystem reports
//! - Map errors to HTTP status codes at the dispatch boundary
//! - Decide which errors are safe to show to callers verbatim
//!
//! # Design Decisions
//! - One flat enum; subsystems attach context as strings
//! - `CompileError` is only ever returned from registration, never dispatch
//! - Errors are `Clone` so they can round-trip through the script engine

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced by registration, dispatch and query execution.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No registered endpoint matches the request.
    #[error("no endpoint matches {0} {1}")]
    NotFound(String, String),

    /// Script body failed to compile at registration time.
    #[error("script compile error: {0}")]
    CompileError(String),

    /// Script raised a runtime failure during execution.
    #[error("script execution error: {0}")]
    ExecutionError(String),

    /// Script exceeded its execution budget.
    #[error("script execution exceeded {0} ms")]
    Timeout(u64),

    /// A named datasource is not registered.
    #[error("unknown datasource: {0}")]
    UnknownDataSource(String),

    /// Waited past the configured bound for a pooled connection.
    #[error("connection pool exhausted for datasource {0}")]
    PoolExhausted(String),

    /// The underlying database rejected the query.
    #[error("query error: {0}")]
    QueryError(String),
}

/// Result type for platform operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status the dispatch boundary reports for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::PoolExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::CompileError(_)
            | ApiError::ExecutionError(_)
            | ApiError::UnknownDataSource(_)
            | ApiError::QueryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message may leak internals (SQL text, script traces).
    ///
    /// When the platform runs with `throw_exception = false` these messages
    /// are replaced by a generic failure string in the response envelope.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::ExecutionError(_) | ApiError::QueryError(_) | ApiError::UnknownDataSource(_)
        )
    }
}
