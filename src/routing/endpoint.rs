//! Endpoint definition model.
//!
//! An endpoint is the unit of registration: a (method, path template) pair
//! carrying a script body and its execution policy. Definitions are plain
//! data (serde-friendly so the binary can preload them from config); the
//! registry stores them alongside the compiled script and the parsed
//! template.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::template::PathTemplate;
use crate::script::CompiledScript;

/// A user-supplied endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointDefinition {
    /// HTTP method (e.g. "GET").
    pub method: String,

    /// Path template with `{name}` segments and an optional trailing
    /// `{*name}` wildcard.
    pub path: String,

    /// Script body executed on dispatch.
    pub script: String,

    /// Named datasource the script's `db` client binds to.
    /// `None` selects the default datasource.
    #[serde(default)]
    pub datasource: Option<String>,

    /// Declared request parameters bound into the script scope.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Per-endpoint execution budget override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Wrap the script result in the result-provider envelope.
    /// When false the raw value is returned as the response body.
    #[serde(default = "default_wrap_result")]
    pub wrap_result: bool,
}

fn default_wrap_result() -> bool {
    true
}

impl Default for EndpointDefinition {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            script: String::new(),
            datasource: None,
            parameters: Vec::new(),
            timeout_ms: None,
            wrap_result: true,
        }
    }
}

/// A declared request parameter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParameterSpec {
    /// Parameter name, matched against path params, query params and body
    /// object fields in that order.
    pub name: String,

    /// Reject the request when the parameter is absent everywhere.
    #[serde(default)]
    pub required: bool,

    /// Value bound when the parameter is absent.
    #[serde(default)]
    pub default: Option<Value>,
}

/// An endpoint as held by the route registry: definition plus the parsed
/// template, the compiled script and registration bookkeeping.
#[derive(Debug)]
pub struct RegisteredEndpoint {
    pub definition: EndpointDefinition,
    pub method: Method,
    pub template: PathTemplate,
    pub script: CompiledScript,
    /// Registration order; lower wins resolution ties. Preserved across
    /// redefinition of the same (method, template).
    pub seq: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Read-only endpoint summary returned by `list()`.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub method: String,
    pub path: String,
    pub datasource: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl RegisteredEndpoint {
    pub fn summary(&self) -> EndpointSummary {
        EndpointSummary {
            method: self.method.to_string(),
            path: self.template.raw().to_string(),
            datasource: self.definition.datasource.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Shared handle to a registered endpoint.
pub type EndpointRef = Arc<RegisteredEndpoint>;

/// Seconds since the unix epoch.
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
