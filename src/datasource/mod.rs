//! Multi-datasource query layer.
//!
//! # Data Flow
//! ```text
//! script `db` call
//!     → client.rs (DbClient: cache view, page window, source view)
//!     → cache (when a caching view is active)
//!     → router.rs (named handle lookup)
//!     → handle.rs (pooled sqlite connection, row materialization)
//! ```
//!
//! # Design Decisions
//! - Handles are registered at startup and frozen; per-request state lives
//!   in the `DbClient` view, not the handles
//! - Pool waits are bounded; exhaustion is a typed error, not a hang

pub mod client;
pub mod handle;
pub mod router;

pub use client::DbClient;
pub use handle::DataSourceHandle;
pub use router::DataSourceRouter;

/// Parameter type accepted by the query surface.
pub use rusqlite::types::Value as SqlValue;
