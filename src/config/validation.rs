//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (endpoints reference existing datasources)
//! - Validate value ranges (capacity > 0, page size > 0)
//! - Detect duplicate datasource names and multiple defaults
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: PlatformConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::PlatformConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PlatformConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cache.capacity == 0 {
        errors.push(ValidationError("cache.capacity must be > 0".to_string()));
    }
    if config.page.default_size == 0 {
        errors.push(ValidationError("page.default_size must be > 0".to_string()));
    }
    if config.script.default_timeout_ms == 0 {
        errors.push(ValidationError(
            "script.default_timeout_ms must be > 0".to_string(),
        ));
    }

    let mut names = HashSet::new();
    let mut defaults = 0usize;
    for ds in &config.datasources {
        if ds.name.is_empty() {
            errors.push(ValidationError("datasource name must not be empty".to_string()));
        }
        if !names.insert(ds.name.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate datasource name: {}",
                ds.name
            )));
        }
        if ds.max_connections == 0 {
            errors.push(ValidationError(format!(
                "datasource {} max_connections must be > 0",
                ds.name
            )));
        }
        if ds.default {
            defaults += 1;
        }
    }
    if defaults > 1 {
        errors.push(ValidationError(
            "at most one datasource may be marked default".to_string(),
        ));
    }

    for endpoint in &config.endpoints {
        if let Some(ds) = &endpoint.datasource {
            if !names.contains(ds.as_str()) {
                errors.push(ValidationError(format!(
                    "endpoint {} {} references unknown datasource {}",
                    endpoint.method, endpoint.path, ds
                )));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
