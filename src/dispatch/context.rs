//! Request and response types at the dispatch boundary.
//!
//! `DispatchRequest` is the sole input the host HTTP layer hands to the
//! core; `DispatchResponse` is what it gets back. `RequestContext` is the
//! resolved, per-request view interceptors and bindings read from.

use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use serde_json::Value;
use uuid::Uuid;

/// An incoming request as seen by the dispatch entry point.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Parsed JSON body, when the request carried one.
    pub body: Option<Value>,
}

impl DispatchRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: None,
        }
    }
}

/// The structured response handed back to the host HTTP layer.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HashMap<String, String>,
}

/// Resolved request state shared with interceptors and bindings.
#[derive(Debug)]
pub struct RequestContext {
    /// Correlation id, generated per dispatch.
    pub request_id: Uuid,
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    /// Bindings extracted from the matched path template.
    pub path_params: Vec<(String, String)>,
}

impl RequestContext {
    pub(crate) fn new(request: DispatchRequest, path_params: Vec<(String, String)>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method: request.method,
            path: request.path,
            headers: request.headers,
            query: request.query,
            body: request.body,
            path_params,
        }
    }

    /// Path parameter by name.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
