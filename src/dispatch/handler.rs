//! Request dispatcher.
//!
//! # Responsibilities
//! - Resolve the request against the route registry
//! - Drive the interceptor chain, honoring short-circuit
//! - Bind request data and inject the per-request `db` client
//! - Invoke the script with the endpoint's budget
//! - Convert every failure into a structured error response
//!
//! # Design Decisions
//! - No error escapes `dispatch`: the host HTTP layer always receives a
//!   well-formed response
//! - Internal error detail is suppressed unless `throw_exception` is on
//! - Binding precedence for declared parameters: path, then query, then
//!   body field; absent + default → default; absent + required → error

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use rhai::Dynamic;
use serde_json::{Map, Value};

use crate::cache::SqlCache;
use crate::datasource::{DataSourceRouter, DbClient};
use crate::dispatch::context::{DispatchRequest, DispatchResponse, RequestContext};
use crate::dispatch::interceptor::InterceptorChain;
use crate::error::{ApiError, ApiResult};
use crate::provider::{PageProvider, ResultProvider};
use crate::routing::{RegisteredEndpoint, RouteRegistry};
use crate::script::{ScriptBindings, ScriptHost};

/// Drives a request from route resolution to a structured response.
pub struct RequestDispatcher {
    registry: Arc<RouteRegistry>,
    host: Arc<ScriptHost>,
    interceptors: InterceptorChain,
    datasources: Arc<DataSourceRouter>,
    cache: Arc<SqlCache>,
    result_provider: Arc<dyn ResultProvider>,
    page_provider: Arc<dyn PageProvider>,
    throw_exception: bool,
    default_timeout: Duration,
}

impl RequestDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: Arc<RouteRegistry>,
        host: Arc<ScriptHost>,
        interceptors: InterceptorChain,
        datasources: Arc<DataSourceRouter>,
        cache: Arc<SqlCache>,
        result_provider: Arc<dyn ResultProvider>,
        page_provider: Arc<dyn PageProvider>,
        throw_exception: bool,
        default_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            host,
            interceptors,
            datasources,
            cache,
            result_provider,
            page_provider,
            throw_exception,
            default_timeout,
        }
    }

    /// Handle one request. Never returns an error; failures become
    /// structured error responses.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResponse {
        match self.run(request).await {
            Ok((value, wrap)) => DispatchResponse {
                status: StatusCode::OK,
                body: if wrap {
                    self.result_provider.wrap_success(value)
                } else {
                    value
                },
                headers: Default::default(),
            },
            Err(error) => self.error_response(error),
        }
    }

    async fn run(&self, request: DispatchRequest) -> ApiResult<(Value, bool)> {
        let matched = self
            .registry
            .resolve(&request.method, &request.path)
            .ok_or_else(|| {
                tracing::warn!(method = %request.method, path = %request.path, "no endpoint matched");
                ApiError::NotFound(request.method.to_string(), request.path.clone())
            })?;

        let endpoint = matched.endpoint;
        let ctx = RequestContext::new(request, matched.path_params);
        let wrap = endpoint.definition.wrap_result;

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            template = %endpoint.template.raw(),
            "dispatching"
        );

        if let Some(short_circuit) = self.interceptors.run_before(&ctx)? {
            let value = self.interceptors.run_after(&ctx, short_circuit)?;
            return Ok((value, wrap));
        }

        let bindings = self.bind(&ctx, &endpoint)?;
        let timeout = endpoint
            .definition
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let value = match self.host.execute(&endpoint.script, bindings, timeout).await {
            Ok(value) => value,
            Err(error) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    template = %endpoint.template.raw(),
                    error = %error,
                    "script execution failed"
                );
                return Err(error);
            }
        };

        let value = self.interceptors.run_after(&ctx, value)?;
        Ok((value, wrap))
    }

    /// Build the request-scoped variable environment.
    fn bind(&self, ctx: &RequestContext, endpoint: &RegisteredEndpoint) -> ApiResult<ScriptBindings> {
        let mut bindings = ScriptBindings::new();

        let headers: Map<String, Value> = ctx
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        bindings.json_variable("headers", &Value::Object(headers))?;

        if let Some(body) = &ctx.body {
            bindings.json_variable("body", body)?;
        }

        // Query params first so path params shadow them on collision.
        for (name, value) in &ctx.query {
            bindings.variable(name.clone(), Dynamic::from(value.clone()));
        }
        for (name, value) in &ctx.path_params {
            bindings.variable(name.clone(), Dynamic::from(value.clone()));
        }

        for spec in &endpoint.definition.parameters {
            let from_path = ctx.path_param(&spec.name).map(|v| Value::String(v.to_string()));
            let from_query = ctx.query.get(&spec.name).map(|v| Value::String(v.clone()));
            let from_body = ctx
                .body
                .as_ref()
                .and_then(|b| b.get(&spec.name))
                .cloned();

            match from_path.or(from_query).or(from_body).or_else(|| spec.default.clone()) {
                Some(value) => bindings.json_variable(spec.name.as_str(), &value)?,
                None if spec.required => {
                    return Err(ApiError::ExecutionError(format!(
                        "required parameter {} is missing",
                        spec.name
                    )));
                }
                None => bindings.variable(spec.name.clone(), Dynamic::UNIT),
            }
        }

        // Bound last so no request parameter can shadow it. An endpoint
        // naming a datasource fails here; one relying on the default only
        // fails if a script actually touches `db` and none is registered.
        match self.datasources.get(endpoint.definition.datasource.as_deref()) {
            Ok(handle) => {
                let page_request = self.page_provider.page_request(&ctx.query);
                let client = DbClient::new(
                    handle,
                    self.datasources.clone(),
                    self.cache.clone(),
                    self.page_provider.clone(),
                    page_request,
                );
                bindings.variable("db", Dynamic::from(client));
            }
            Err(error) if endpoint.definition.datasource.is_some() => return Err(error),
            Err(_) => {}
        }

        Ok(bindings)
    }

    fn error_response(&self, error: ApiError) -> DispatchResponse {
        let (message, detail) = if error.is_internal() {
            if self.throw_exception {
                (error.to_string(), Some(format!("{:?}", error)))
            } else {
                ("request failed".to_string(), None)
            }
        } else {
            (error.to_string(), None)
        };

        DispatchResponse {
            status: error.status(),
            body: self.result_provider.wrap_error(&message, detail.as_deref()),
            headers: Default::default(),
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("interceptors", &self.interceptors.len())
            .field("throw_exception", &self.throw_exception)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
