//! Shared fixtures for integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use dynapi::config::{DataSourceConfig, PlatformConfig};
use dynapi::datasource::SqlValue;
use dynapi::dispatch::DispatchRequest;
use dynapi::platform::{ApiPlatform, PlatformBuilder};
use dynapi::routing::EndpointDefinition;
use tempfile::TempDir;

/// A platform backed by file-based sqlite databases that live as long as
/// the fixture.
pub struct TestPlatform {
    pub platform: Arc<ApiPlatform>,
    _dir: TempDir,
}

/// Build a platform with a seeded default datasource (`main`) and an empty
/// secondary one (`other`). The callback can adjust the config before the
/// platform is assembled.
pub fn platform_with<F>(adjust: F) -> TestPlatform
where
    F: FnOnce(&mut PlatformConfig),
{
    build(adjust, |b| b)
}

/// Same as [`platform_with`], but also lets the caller extend the builder
/// (interceptors, modules, providers).
pub fn build<F, B>(adjust: F, extend: B) -> TestPlatform
where
    F: FnOnce(&mut PlatformConfig),
    B: FnOnce(PlatformBuilder) -> PlatformBuilder,
{
    let dir = tempfile::tempdir().unwrap();

    let mut config = PlatformConfig::default();
    config.datasources.push(DataSourceConfig {
        name: "main".to_string(),
        path: dir.path().join("main.db").to_string_lossy().into_owned(),
        default: true,
        max_connections: 4,
        acquire_timeout_ms: 500,
    });
    config.datasources.push(DataSourceConfig {
        name: "other".to_string(),
        path: dir.path().join("other.db").to_string_lossy().into_owned(),
        default: false,
        max_connections: 2,
        acquire_timeout_ms: 500,
    });
    adjust(&mut config);

    let platform = extend(ApiPlatform::builder(config)).build().unwrap();
    seed(&platform);

    TestPlatform {
        platform: Arc::new(platform),
        _dir: dir,
    }
}

pub fn platform() -> TestPlatform {
    platform_with(|_| {})
}

fn seed(platform: &ApiPlatform) {
    let main = platform.datasource(None).unwrap();
    main.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, group_name TEXT)",
        &[],
    )
    .unwrap();
    for (name, group) in [("alice", "admins"), ("bob", "users"), ("carol", "users")] {
        main.execute(
            "INSERT INTO users (name, group_name) VALUES (?, ?)",
            &[SqlValue::Text(name.to_string()), SqlValue::Text(group.to_string())],
        )
        .unwrap();
    }

    let other = platform.datasource(Some("other")).unwrap();
    other
        .execute("CREATE TABLE audit (id INTEGER PRIMARY KEY, entry TEXT)", &[])
        .unwrap();
    other
        .execute("INSERT INTO audit (entry) VALUES ('from-other')", &[])
        .unwrap();
}

/// Definition with sane defaults for tests.
pub fn endpoint(method: &str, path: &str, script: &str) -> EndpointDefinition {
    EndpointDefinition {
        method: method.to_string(),
        path: path.to_string(),
        script: script.to_string(),
        ..EndpointDefinition::default()
    }
}

pub fn get(path: &str) -> DispatchRequest {
    DispatchRequest::new(Method::GET, path)
}

pub fn get_with_query(path: &str, query: &[(&str, &str)]) -> DispatchRequest {
    let mut request = get(path);
    request.query = query
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>();
    request
}

pub fn post_json(path: &str, body: serde_json::Value) -> DispatchRequest {
    let mut request = DispatchRequest::new(Method::POST, path);
    request.body = Some(body);
    request
}
