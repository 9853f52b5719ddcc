//! Axum host adapter.
//!
//! # Responsibilities
//! - Adapt HTTP requests into `DispatchRequest`s and back
//! - Mount the dispatcher as a fallback handler so every (method, path)
//!   reaches the route registry
//!
//! # Design Decisions
//! - The core stays transport-free; this module is the only place axum
//!   request/response machinery appears
//! - Non-JSON bodies are passed through as absent rather than rejected;
//!   scripts that need the raw payload read declared parameters instead

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::Response,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::dispatch::DispatchRequest;
use crate::platform::ApiPlatform;

/// Largest request body the adapter will buffer.
const BODY_LIMIT: usize = 1024 * 1024;

/// Build the host router: every request falls through to the dispatcher.
pub fn router(platform: Arc<ApiPlatform>) -> Router {
    Router::new()
        .fallback(dispatch_handler)
        .with_state(platform)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch_handler(
    State(platform): State<Arc<ApiPlatform>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let headers: HashMap<String, String> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes).ok(),
        _ => None,
    };

    let outcome = platform
        .dispatch(DispatchRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers,
            query,
            body,
        })
        .await;

    let payload = serde_json::to_vec(&outcome.body).unwrap_or_default();
    let mut builder = Response::builder()
        .status(outcome.status)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in &outcome.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Body::from(payload)).unwrap_or_else(|_| {
        let mut fallback = Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
