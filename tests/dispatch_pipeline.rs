//! End-to-end dispatch tests over a real platform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use dynapi::dispatch::{Flow, RequestInterceptor};
use dynapi::error::ApiResult;
use dynapi::routing::ParameterSpec;

mod common;
use common::{endpoint, get, get_with_query, platform, platform_with, post_json};

#[tokio::test]
async fn test_hello_world() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint("GET", "/hello/{name}", r#""Hi " + name"#))
        .unwrap();

    let response = fixture.platform.dispatch(get("/hello/world")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["code"], 1);
    assert_eq!(response.body["data"], "Hi world");
}

#[tokio::test]
async fn test_unmatched_route_is_404() {
    let fixture = platform();
    let response = fixture.platform.dispatch(get("/nowhere")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], 0);
}

#[tokio::test]
async fn test_query_params_bind_as_variables() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint("GET", "/greet", r#""Hi " + who"#))
        .unwrap();

    let response = fixture
        .platform
        .dispatch(get_with_query("/greet", &[("who", "mars")]))
        .await;
    assert_eq!(response.body["data"], "Hi mars");
}

#[tokio::test]
async fn test_body_fields_bind_via_body_variable() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint("POST", "/echo", "body.value * 2"))
        .unwrap();

    let response = fixture
        .platform
        .dispatch(post_json("/echo", json!({"value": 21})))
        .await;
    assert_eq!(response.body["data"], 42);
}

#[tokio::test]
async fn test_declared_parameter_default_and_required() {
    let fixture = platform();
    let mut definition = endpoint("GET", "/items", "limit");
    definition.parameters = vec![ParameterSpec {
        name: "limit".to_string(),
        required: false,
        default: Some(json!(25)),
    }];
    fixture.platform.register_endpoint(definition).unwrap();

    let response = fixture.platform.dispatch(get("/items")).await;
    assert_eq!(response.body["data"], 25);

    let mut definition = endpoint("GET", "/strict", "token");
    definition.parameters = vec![ParameterSpec {
        name: "token".to_string(),
        required: true,
        default: None,
    }];
    fixture.platform.register_endpoint(definition).unwrap();

    let response = fixture.platform.dispatch(get("/strict")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    // Internal detail is suppressed by default.
    assert_eq!(response.body["message"], "request failed");
}

#[tokio::test]
async fn test_throw_exception_exposes_detail() {
    let fixture = platform_with(|config| config.throw_exception = true);
    fixture
        .platform
        .register_endpoint(endpoint("GET", "/boom", "no_such_function()"))
        .unwrap();

    let response = fixture.platform.dispatch(get("/boom")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = response.body["message"].as_str().unwrap();
    assert!(message.contains("script execution error"));
    assert!(response.body.get("detail").is_some());
}

#[tokio::test]
async fn test_suppressed_detail_by_default() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint("GET", "/boom", "no_such_function()"))
        .unwrap();

    let response = fixture.platform.dispatch(get("/boom")).await;
    assert_eq!(response.body["message"], "request failed");
    assert!(response.body.get("detail").is_none());
}

#[tokio::test]
async fn test_raw_result_mode_skips_envelope() {
    let fixture = platform();
    let mut definition = endpoint("GET", "/raw", r#"#{ "plain": true }"#);
    definition.wrap_result = false;
    fixture.platform.register_endpoint(definition).unwrap();

    let response = fixture.platform.dispatch(get("/raw")).await;
    assert_eq!(response.body, json!({"plain": true}));
}

#[tokio::test]
async fn test_select_over_seeded_table() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/users",
            r#"db.select("SELECT name FROM users ORDER BY id")"#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/users")).await;
    assert_eq!(
        response.body["data"],
        json!([{"name": "alice"}, {"name": "bob"}, {"name": "carol"}])
    );
}

#[tokio::test]
async fn test_parameterized_select() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/users/{id}",
            r#"db.select_one("SELECT name FROM users WHERE id = ?", [id.parse_int()])"#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/users/2")).await;
    assert_eq!(response.body["data"], json!({"name": "bob"}));
}

#[tokio::test]
async fn test_page_uses_request_window() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/users/page",
            r#"db.page("SELECT name FROM users ORDER BY id")"#,
        ))
        .unwrap();

    let response = fixture
        .platform
        .dispatch(get_with_query("/users/page", &[("page", "2"), ("size", "1")]))
        .await;

    let data = &response.body["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["page"], 2);
    assert_eq!(data["list"], json!([{"name": "bob"}]));
}

#[tokio::test]
async fn test_update_and_insert() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint(
            "POST",
            "/users",
            r#"db.insert("INSERT INTO users (name, group_name) VALUES (?, ?)", [body.name, "users"])"#,
        ))
        .unwrap();

    let response = fixture
        .platform
        .dispatch(post_json("/users", json!({"name": "dave"})))
        .await;
    assert_eq!(response.body["data"], 4);

    let count = fixture
        .platform
        .datasource(None)
        .unwrap()
        .query_scalar("SELECT COUNT(*) FROM users", &[])
        .unwrap();
    assert_eq!(count, json!(4));
}

#[tokio::test]
async fn test_camel_case_row_keys() {
    let fixture = platform_with(|config| config.map_underscore_to_camel_case = true);
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/groups",
            r#"db.select_one("SELECT group_name FROM users WHERE id = 1")"#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/groups")).await;
    assert_eq!(response.body["data"], json!({"groupName": "admins"}));
}

#[tokio::test]
async fn test_endpoint_bound_to_named_datasource() {
    let fixture = platform();
    let mut definition = endpoint(
        "GET",
        "/audit",
        r#"db.select("SELECT entry FROM audit")"#,
    );
    definition.datasource = Some("other".to_string());
    fixture.platform.register_endpoint(definition).unwrap();

    let response = fixture.platform.dispatch(get("/audit")).await;
    assert_eq!(response.body["data"], json!([{"entry": "from-other"}]));
}

#[tokio::test]
async fn test_script_can_reroute_to_named_source() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/cross",
            r#"db.source("other").select_value("SELECT entry FROM audit")"#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/cross")).await;
    assert_eq!(response.body["data"], "from-other");
}

#[tokio::test]
async fn test_unknown_datasource_is_error() {
    let fixture = platform_with(|config| config.throw_exception = true);
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/lost",
            r#"db.source("reporting").select_value("SELECT 1")"#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/lost")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .contains("unknown datasource: reporting"));
}

#[tokio::test]
async fn test_redefinition_replaces_atomically() {
    let fixture = platform();
    fixture
        .platform
        .register_endpoint(endpoint("GET", "/v", r#""one""#))
        .unwrap();
    assert_eq!(
        fixture.platform.dispatch(get("/v")).await.body["data"],
        "one"
    );

    fixture
        .platform
        .register_endpoint(endpoint("GET", "/v", r#""two""#))
        .unwrap();
    assert_eq!(fixture.platform.list_endpoints().len(), 1);
    assert_eq!(
        fixture.platform.dispatch(get("/v")).await.body["data"],
        "two"
    );
}

struct Gatekeeper {
    script_after: AtomicUsize,
}

impl RequestInterceptor for Gatekeeper {
    fn before(&self, ctx: &dynapi::dispatch::RequestContext) -> ApiResult<Flow> {
        if ctx.headers.get("x-token").map(String::as_str) == Some("secret") {
            Ok(Flow::Continue)
        } else {
            Ok(Flow::ShortCircuit(json!("blocked")))
        }
    }

    fn after(&self, _ctx: &dynapi::dispatch::RequestContext, value: Value) -> ApiResult<Value> {
        self.script_after.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[tokio::test]
async fn test_interceptor_short_circuit_skips_script_but_runs_after() {
    let gate = Arc::new(Gatekeeper {
        script_after: AtomicUsize::new(0),
    });
    let fixture = common::build(|_| {}, |builder| builder.add_interceptor(gate.clone()));

    // A script with a side effect proves the body never ran.
    fixture
        .platform
        .register_endpoint(endpoint(
            "GET",
            "/guarded",
            r#"db.update("INSERT INTO users (name) VALUES ('intruder')"); "ran""#,
        ))
        .unwrap();

    let response = fixture.platform.dispatch(get("/guarded")).await;
    assert_eq!(response.body["data"], "blocked");
    assert_eq!(gate.script_after.load(Ordering::SeqCst), 1);

    let count = fixture
        .platform
        .datasource(None)
        .unwrap()
        .query_scalar("SELECT COUNT(*) FROM users WHERE name = 'intruder'", &[])
        .unwrap();
    assert_eq!(count, json!(0));

    // With the right header the script runs and after hooks fire again.
    let mut request = get("/guarded");
    request
        .headers
        .insert("x-token".to_string(), "secret".to_string());
    let response = fixture.platform.dispatch(request).await;
    assert_eq!(response.body["data"], "ran");
    assert_eq!(gate.script_after.load(Ordering::SeqCst), 2);
}
