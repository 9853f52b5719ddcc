//! Query result caching.
//!
//! The cache sits between the script-facing `db` client and the datasource
//! layer: reads through a caching client view consult it before touching
//! the database, keyed by a fingerprint of the resolved SQL text plus the
//! bound parameter values.

pub mod sql_cache;

pub use sql_cache::{CacheStats, SqlCache};
