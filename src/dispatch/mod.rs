//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! host HTTP layer
//!     → DispatchRequest
//!     → handler.rs: registry resolve → before hooks → bind → script →
//!       after hooks → result provider
//!     → DispatchResponse {status, body, headers}
//! ```

pub mod context;
pub mod handler;
pub mod interceptor;

pub use context::{DispatchRequest, DispatchResponse, RequestContext};
pub use handler::RequestDispatcher;
pub use interceptor::{Flow, InterceptorChain, RequestInterceptor};
