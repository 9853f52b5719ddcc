//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PlatformConfig (validated, immutable)
//!     → consumed once by the platform builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime mutation happens through the
//!   registration API, not config edits
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{CacheConfig, DataSourceConfig, PageConfig, PlatformConfig, ScriptConfig};
