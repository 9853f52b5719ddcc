//! Named datasource lookup.
//!
//! # Responsibilities
//! - Map datasource names to their pooled handles
//! - Resolve the unnamed (default) datasource
//! - Fail lookups for unknown names, never silently fall back
//!
//! # Design Decisions
//! - Built once by the platform builder and frozen; in-flight executions
//!   share it read-only, so lookups take no lock
//! - The default is the handle flagged in config, else the first registered

use std::collections::HashMap;
use std::sync::Arc;

use crate::datasource::handle::DataSourceHandle;
use crate::error::{ApiError, ApiResult};

/// Routes logical datasource names to pooled handles.
#[derive(Debug, Default)]
pub struct DataSourceRouter {
    sources: HashMap<String, Arc<DataSourceHandle>>,
    default_name: Option<String>,
}

impl DataSourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. The first registered handle becomes the default
    /// unless a later one is explicitly flagged.
    pub fn insert(&mut self, handle: Arc<DataSourceHandle>, is_default: bool) {
        let name = handle.name().to_string();
        if is_default || self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.sources.insert(name, handle);
    }

    /// Resolve a name to its handle. `None` or an empty name selects the
    /// default; an unknown name is an error.
    pub fn get(&self, name: Option<&str>) -> ApiResult<Arc<DataSourceHandle>> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => self
                .default_name
                .as_deref()
                .ok_or_else(|| ApiError::UnknownDataSource("default".to_string()))?,
        };

        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownDataSource(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
