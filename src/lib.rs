//! dynapi: a low-code API platform core.
//!
//! Administrators define HTTP endpoints at runtime (path template, method,
//! script body, datasource, caching policy) without redeploying the host
//! process. Each request flows through a concurrently-mutable route table
//! to a script interpreter that queries pooled datasources behind an
//! LRU+TTL result cache.
//!
//! # Architecture Overview
//!
//! ```text
//!  host HTTP layer (serve)                registration API
//!        │                                      │
//!        ▼                                      ▼
//!  ┌──────────────┐   resolve   ┌────────────────────────────┐
//!  │   dispatch   │────────────▶│   routing (arc-swap table) │
//!  │  (handler +  │             └────────────────────────────┘
//!  │ interceptors)│
//!  └──────┬───────┘
//!         │ execute
//!         ▼
//!  ┌──────────────┐   db calls  ┌──────────────┐   miss   ┌────────────┐
//!  │    script    │────────────▶│    cache     │─────────▶│ datasource │
//!  │ (rhai host)  │             │  (LRU+TTL)   │          │ (r2d2 pool)│
//!  └──────────────┘             └──────────────┘          └────────────┘
//!         │
//!         ▼
//!  result/page providers (pluggable envelopes)
//! ```
//!
//! The `platform` module assembles the pieces; everything request-scoped
//! lives in the dispatch context and script scope, so concurrent requests
//! share only read-only state.

// Core subsystems
pub mod dispatch;
pub mod routing;
pub mod script;

// Data access
pub mod cache;
pub mod datasource;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod provider;

// Assembly and host integration
pub mod platform;
pub mod serve;

pub use config::PlatformConfig;
pub use dispatch::{DispatchRequest, DispatchResponse, Flow, RequestInterceptor};
pub use error::{ApiError, ApiResult};
pub use platform::{ApiPlatform, PlatformBuilder};
pub use routing::EndpointDefinition;
pub use script::{ScriptExtension, ScriptModule};
