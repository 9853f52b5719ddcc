//! Pluggable result and page providers.
//!
//! The core never hard-codes a wire shape: success values, error outcomes
//! and paginated rows are handed to these capabilities so the platform can
//! be embedded under different response conventions. Defaults produce a
//! `{code, message, data}` envelope and a `{total, page, size, list}` page.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::config::PageConfig;

/// Requested page window, extracted from query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.size
    }

    pub fn limit(&self) -> u64 {
        self.size
    }
}

/// Shapes success and error response bodies.
pub trait ResultProvider: Send + Sync {
    fn wrap_success(&self, value: Value) -> Value;

    /// `detail` is only present when the platform is configured to expose
    /// internal error detail.
    fn wrap_error(&self, message: &str, detail: Option<&str>) -> Value;
}

/// Extracts page requests and shapes page envelopes.
pub trait PageProvider: Send + Sync {
    fn page_request(&self, query: &HashMap<String, String>) -> PageRequest;

    fn wrap_page(&self, total: u64, rows: Value, request: &PageRequest) -> Value;
}

/// Default `{code, message, data}` envelope.
#[derive(Debug, Default)]
pub struct DefaultResultProvider;

impl ResultProvider for DefaultResultProvider {
    fn wrap_success(&self, value: Value) -> Value {
        json!({
            "code": 1,
            "message": "success",
            "data": value,
        })
    }

    fn wrap_error(&self, message: &str, detail: Option<&str>) -> Value {
        match detail {
            Some(detail) => json!({
                "code": 0,
                "message": message,
                "detail": detail,
            }),
            None => json!({
                "code": 0,
                "message": message,
            }),
        }
    }
}

/// Default page provider driven by configurable parameter names.
#[derive(Debug)]
pub struct DefaultPageProvider {
    config: PageConfig,
}

impl DefaultPageProvider {
    pub fn new(config: PageConfig) -> Self {
        Self { config }
    }
}

impl PageProvider for DefaultPageProvider {
    fn page_request(&self, query: &HashMap<String, String>) -> PageRequest {
        let page = query
            .get(&self.config.page_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.config.default_page)
            .max(1);
        let size = query
            .get(&self.config.size_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.config.default_size)
            .max(1);
        PageRequest { page, size }
    }

    fn wrap_page(&self, total: u64, rows: Value, request: &PageRequest) -> Value {
        json!({
            "total": total,
            "page": request.page,
            "size": request.size,
            "list": rows,
        })
    }
}
