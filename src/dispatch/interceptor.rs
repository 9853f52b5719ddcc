//! Ordered pre/post hooks around dispatch.
//!
//! # Responsibilities
//! - Run `before` hooks in registration order, honoring short-circuit
//! - Run `after` hooks over the raw result (or a short-circuit value)
//!
//! # Design Decisions
//! - The chain is frozen at platform build; hooks must be safe for
//!   concurrent invocation across simultaneous requests
//! - A short-circuit skips the script and remaining `before` hooks but
//!   still flows through every `after` hook

use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::context::RequestContext;
use crate::error::ApiResult;

/// Outcome of a `before` hook.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Skip script execution and answer with this value.
    ShortCircuit(Value),
}

/// A pre/post hook around endpoint execution.
pub trait RequestInterceptor: Send + Sync {
    fn before(&self, _ctx: &RequestContext) -> ApiResult<Flow> {
        Ok(Flow::Continue)
    }

    fn after(&self, _ctx: &RequestContext, value: Value) -> ApiResult<Value> {
        Ok(value)
    }
}

/// Registration-ordered interceptor list.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn RequestInterceptor>>) -> Self {
        Self { interceptors }
    }

    /// Run `before` hooks in order. Returns the short-circuit value of the
    /// first hook that produces one.
    pub fn run_before(&self, ctx: &RequestContext) -> ApiResult<Option<Value>> {
        for interceptor in &self.interceptors {
            if let Flow::ShortCircuit(value) = interceptor.before(ctx)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Run every `after` hook in order over the (possibly short-circuit)
    /// result value.
    pub fn run_after(&self, ctx: &RequestContext, mut value: Value) -> ApiResult<Value> {
        for interceptor in &self.interceptors {
            value = interceptor.after(ctx, value)?;
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
