//! Route table and path matching.
//!
//! # Data Flow
//! ```text
//! registration API
//!     → template.rs (parse path template)
//!     → registry.rs (publish new immutable snapshot)
//!
//! dispatch
//!     → registry.rs resolve() against the current snapshot (lock-free)
//!     → RouteMatch { endpoint, extracted path params }
//! ```

pub mod endpoint;
pub mod registry;
pub mod template;

pub use endpoint::{EndpointDefinition, EndpointRef, EndpointSummary, ParameterSpec, RegisteredEndpoint};
pub use registry::{RouteMatch, RouteRegistry};
pub use template::PathTemplate;
