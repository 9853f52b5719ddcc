//! Script compilation and execution.
//!
//! # Data Flow
//! ```text
//! registration
//!     → host.rs compile(), eager; CompileError rejects the endpoint
//!
//! dispatch
//!     → executor.rs execute(compiled, bindings, timeout)
//!     → blocking pool eval with a per-thread deadline
//!     → value | ExecutionError | Timeout
//! ```

pub mod builtins;
pub mod executor;
pub mod host;

pub use executor::ScriptBindings;
pub use host::{CompiledScript, ScriptExtension, ScriptHost, ScriptModule};
