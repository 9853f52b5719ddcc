//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! platform. All types derive Serde traits for deserialization from config
//! files, and every field has a default so a minimal config is valid.

use serde::{Deserialize, Serialize};

use crate::routing::EndpointDefinition;

/// Root configuration for the API platform.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PlatformConfig {
    /// Path prefix prepended to every registered endpoint (e.g. "/api").
    pub prefix: Option<String>,

    /// Expose internal error detail (script traces, SQL messages) to
    /// callers. Off by default; production posture suppresses detail.
    pub throw_exception: bool,

    /// Map `snake_case` column names to `camelCase` keys in result rows.
    pub map_underscore_to_camel_case: bool,

    /// Script execution settings.
    pub script: ScriptConfig,

    /// Query result cache settings.
    pub cache: CacheConfig,

    /// Pagination parameter settings.
    pub page: PageConfig,

    /// Named datasource definitions.
    pub datasources: Vec<DataSourceConfig>,

    /// Endpoint definitions registered at startup.
    pub endpoints: Vec<EndpointDefinition>,
}

/// Script execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Execution budget applied when an endpoint has no override.
    pub default_timeout_ms: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

/// Query result cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached result sets.
    pub capacity: usize,

    /// Default time-to-live in milliseconds. `0` disables expiry.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            ttl_ms: 60_000,
        }
    }
}

/// Pagination parameter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PageConfig {
    /// Query parameter carrying the requested page number.
    pub page_param: String,

    /// Query parameter carrying the requested page size.
    pub size_param: String,

    /// Page number assumed when the parameter is absent.
    pub default_page: u64,

    /// Page size assumed when the parameter is absent.
    pub default_size: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            size_param: "size".to_string(),
            default_page: 1,
            default_size: 10,
        }
    }
}

/// A named datasource backed by a pooled sqlite database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceConfig {
    /// Datasource name scripts and endpoints refer to.
    pub name: String,

    /// Database path. `:memory:` opens an in-memory database
    /// (one private database per pooled connection).
    pub path: String,

    /// Marks this datasource as the default for endpoints that name none.
    #[serde(default)]
    pub default: bool,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection before failing.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert!(config.prefix.is_none());
        assert!(!config.throw_exception);
        assert_eq!(config.cache.capacity, 1_000);
        assert_eq!(config.cache.ttl_ms, 60_000);
        assert_eq!(config.page.page_param, "page");
        assert_eq!(config.page.default_size, 10);
        assert_eq!(config.script.default_timeout_ms, 30_000);
        assert!(config.datasources.is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let config: PlatformConfig = toml::from_str(
            r#"
            prefix = "/api"

            [[datasources]]
            name = "main"
            path = ":memory:"
            default = true
            "#,
        )
        .unwrap();

        assert_eq!(config.prefix.as_deref(), Some("/api"));
        assert_eq!(config.datasources.len(), 1);
        assert_eq!(config.datasources[0].max_connections, 8);
        assert!(config.datasources[0].default);
    }
}
