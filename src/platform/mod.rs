//! Platform facade and builder.
//!
//! # Responsibilities
//! - Assemble the subsystems from configuration and collaborator
//!   registrations (modules, extensions, interceptors, datasources,
//!   providers)
//! - Expose the registration API (`register_endpoint`, `unregister_endpoint`,
//!   `list_endpoints`) and the dispatch entry point
//!
//! # Design Decisions
//! - Collaborators register on the builder and are frozen at `build()`;
//!   only the route table mutates at runtime
//! - The configured prefix is applied at registration so the registry and
//!   dispatch never reason about it

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;

use crate::cache::SqlCache;
use crate::config::PlatformConfig;
use crate::datasource::{DataSourceHandle, DataSourceRouter};
use crate::dispatch::{
    DispatchRequest, DispatchResponse, InterceptorChain, RequestDispatcher, RequestInterceptor,
};
use crate::error::{ApiError, ApiResult};
use crate::provider::{DefaultPageProvider, DefaultResultProvider, PageProvider, ResultProvider};
use crate::routing::{template, EndpointDefinition, EndpointSummary, PathTemplate, RouteRegistry};
use crate::script::{ScriptExtension, ScriptHost, ScriptModule};

/// The assembled platform: route registry, script host, dispatcher and the
/// shared caches and datasources behind them.
#[derive(Debug)]
pub struct ApiPlatform {
    prefix: Option<String>,
    registry: Arc<RouteRegistry>,
    host: Arc<ScriptHost>,
    dispatcher: RequestDispatcher,
    cache: Arc<SqlCache>,
    datasources: Arc<DataSourceRouter>,
}

impl ApiPlatform {
    pub fn builder(config: PlatformConfig) -> PlatformBuilder {
        PlatformBuilder::new(config)
    }

    /// Register or atomically replace an endpoint.
    ///
    /// The script is compiled eagerly; on `CompileError` the route table is
    /// left untouched and nothing of the endpoint is retained.
    pub fn register_endpoint(&self, definition: EndpointDefinition) -> ApiResult<()> {
        let method = parse_method(&definition.method)?;
        let template = PathTemplate::parse(&self.full_path(&definition.path))?;
        let script = self.host.compile(&definition.script)?;

        let path = template.raw().to_string();
        let replaced = self
            .registry
            .register(definition, method.clone(), template, script);
        tracing::info!(
            method = %method,
            path = %path,
            replaced,
            "endpoint registered"
        );
        Ok(())
    }

    /// Remove an endpoint. Returns true when one was removed.
    pub fn unregister_endpoint(&self, method: &str, path: &str) -> ApiResult<bool> {
        let method = parse_method(method)?;
        let removed = self.registry.unregister(&method, &self.full_path(path));
        if removed {
            tracing::info!(method = %method, path = %path, "endpoint unregistered");
        }
        Ok(removed)
    }

    /// Snapshot of all registered endpoints.
    pub fn list_endpoints(&self) -> Vec<EndpointSummary> {
        self.registry.list()
    }

    /// The sole entry point the host HTTP layer calls.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResponse {
        self.dispatcher.dispatch(request).await
    }

    /// Shared result cache (hit/miss counters are test and ops probes).
    pub fn cache(&self) -> &Arc<SqlCache> {
        &self.cache
    }

    /// Resolve a datasource handle (pool-state probes).
    pub fn datasource(&self, name: Option<&str>) -> ApiResult<Arc<DataSourceHandle>> {
        self.datasources.get(name)
    }

    fn full_path(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => template::normalize(&format!("{}/{}", prefix, path.trim_start_matches('/'))),
            None => template::normalize(path),
        }
    }
}

/// Collects collaborators, then assembles an [`ApiPlatform`].
pub struct PlatformBuilder {
    config: PlatformConfig,
    modules: Vec<(String, Arc<dyn ScriptModule>)>,
    extensions: Vec<Arc<dyn ScriptExtension>>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    result_provider: Option<Arc<dyn ResultProvider>>,
    page_provider: Option<Arc<dyn PageProvider>>,
    data_sources: Vec<(Arc<DataSourceHandle>, bool)>,
}

impl PlatformBuilder {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            modules: Vec::new(),
            extensions: Vec::new(),
            interceptors: Vec::new(),
            result_provider: None,
            page_provider: None,
            data_sources: Vec::new(),
        }
    }

    /// Register a named capability module visible to scripts.
    pub fn register_module(mut self, name: impl Into<String>, module: Arc<dyn ScriptModule>) -> Self {
        self.modules.push((name.into(), module));
        self
    }

    /// Register a type-extension capability on the script engine.
    pub fn register_extension(mut self, extension: Arc<dyn ScriptExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Append an interceptor; hooks run in registration order.
    pub fn add_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace the default result envelope provider.
    pub fn result_provider(mut self, provider: Arc<dyn ResultProvider>) -> Self {
        self.result_provider = Some(provider);
        self
    }

    /// Replace the default page provider.
    pub fn page_provider(mut self, provider: Arc<dyn PageProvider>) -> Self {
        self.page_provider = Some(provider);
        self
    }

    /// Register an externally-opened datasource handle.
    pub fn register_data_source(mut self, handle: Arc<DataSourceHandle>, is_default: bool) -> Self {
        self.data_sources.push((handle, is_default));
        self
    }

    /// Open configured datasources, freeze the collaborator registries and
    /// preload configured endpoints.
    pub fn build(self) -> ApiResult<ApiPlatform> {
        let config = self.config;

        let mut router = DataSourceRouter::new();
        for ds_config in &config.datasources {
            let handle = DataSourceHandle::open(ds_config, config.map_underscore_to_camel_case)?;
            router.insert(Arc::new(handle), ds_config.default);
        }
        for (handle, is_default) in self.data_sources {
            router.insert(handle, is_default);
        }
        let datasources = Arc::new(router);

        let host = Arc::new(ScriptHost::build(&self.modules, &self.extensions));
        let cache = Arc::new(SqlCache::new(
            config.cache.capacity,
            Duration::from_millis(config.cache.ttl_ms),
        ));
        let result_provider = self
            .result_provider
            .unwrap_or_else(|| Arc::new(DefaultResultProvider));
        let page_provider = self
            .page_provider
            .unwrap_or_else(|| Arc::new(DefaultPageProvider::new(config.page.clone())));

        let registry = Arc::new(RouteRegistry::new());
        let dispatcher = RequestDispatcher::new(
            registry.clone(),
            host.clone(),
            InterceptorChain::new(self.interceptors),
            datasources.clone(),
            cache.clone(),
            result_provider,
            page_provider,
            config.throw_exception,
            Duration::from_millis(config.script.default_timeout_ms),
        );

        let prefix = config
            .prefix
            .as_deref()
            .map(template::normalize)
            .filter(|p| p != "/");

        let platform = ApiPlatform {
            prefix,
            registry,
            host,
            dispatcher,
            cache,
            datasources,
        };

        for definition in config.endpoints {
            platform.register_endpoint(definition)?;
        }

        Ok(platform)
    }
}

fn parse_method(method: &str) -> ApiResult<Method> {
    method
        .to_uppercase()
        .parse()
        .map_err(|_| ApiError::CompileError(format!("invalid HTTP method: {}", method)))
}
