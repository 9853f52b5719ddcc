//! Timed script execution.
//!
//! # Responsibilities
//! - Run a compiled script against request-scoped bindings
//! - Enforce the execution budget and surface `Timeout`
//! - Translate engine failures back into the error taxonomy
//!
//! # Design Decisions
//! - Scripts run on the blocking pool; the async caller awaits with
//!   `tokio::time::timeout` so the response is resolved at the budget even
//!   while the interpreter sits inside a native call
//! - The engine's progress hook terminates the detached run at the next
//!   interpreter step via a per-thread deadline, so a timed-out script
//!   stops burning a blocking thread and its connection guards drop back
//!   to their pools
//! - A fresh `Scope` per invocation: no shared mutable execution state

use std::cell::Cell;
use std::time::{Duration, Instant};

use rhai::{Dynamic, EvalAltResult, Scope};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::script::host::{CompiledScript, ScriptHost};

thread_local! {
    static DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// True once the executing thread's script deadline has passed.
/// Consulted by the engine's progress hook.
pub(crate) fn deadline_exceeded() -> bool {
    DEADLINE.with(|d| d.get().is_some_and(|t| Instant::now() >= t))
}

/// Request-scoped variable bindings for one script invocation.
///
/// Injected capabilities (`db`, module instances) and request data alike
/// are plain scope variables: registered methods take `&mut` receivers,
/// which the engine refuses to call on constants. Names are
/// case-sensitive; later pushes shadow earlier ones.
#[derive(Debug, Default)]
pub struct ScriptBindings {
    variables: Vec<(String, Dynamic)>,
}

impl ScriptBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&mut self, name: impl Into<String>, value: Dynamic) {
        self.variables.push((name.into(), value));
    }

    /// Bind a JSON value, converting it into the engine's representation.
    pub fn json_variable(&mut self, name: impl Into<String>, value: &Value) -> ApiResult<()> {
        let dynamic = rhai::serde::to_dynamic(value)
            .map_err(|e| ApiError::ExecutionError(format!("unbindable value: {}", e)))?;
        self.variables.push((name.into(), dynamic));
        Ok(())
    }
}

impl ScriptHost {
    /// Execute a compiled script with a hard wall-clock budget.
    ///
    /// Returns `Timeout` once the budget elapses; the underlying run is
    /// terminated by the progress hook as soon as control returns to the
    /// interpreter (best-effort for in-flight native calls).
    pub async fn execute(
        &self,
        script: &CompiledScript,
        bindings: ScriptBindings,
        timeout: Duration,
    ) -> ApiResult<Value> {
        let engine = self.engine.clone();
        let modules = self.modules.clone();
        let ast = script.ast.clone();
        let timeout_ms = timeout.as_millis() as u64;

        let task = tokio::task::spawn_blocking(move || {
            let mut scope = Scope::new();
            // Request data first, module instances last: a request
            // parameter must never shadow an injected capability.
            for (name, value) in bindings.variables {
                scope.push_dynamic(name, value);
            }
            for (name, value) in modules {
                scope.push_dynamic(name, value);
            }

            DEADLINE.with(|d| d.set(Some(Instant::now() + timeout)));
            let result = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);
            DEADLINE.with(|d| d.set(None));
            result
        });

        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(ApiError::Timeout(timeout_ms)),
            Ok(Err(join_error)) => Err(ApiError::ExecutionError(format!(
                "script task failed: {}",
                join_error
            ))),
            Ok(Ok(Ok(value))) => dynamic_to_value(value),
            Ok(Ok(Err(eval_error))) => Err(unwrap_script_error(*eval_error, timeout_ms)),
        }
    }
}

fn dynamic_to_value(value: Dynamic) -> ApiResult<Value> {
    if value.is_unit() {
        return Ok(Value::Null);
    }
    rhai::serde::from_dynamic(&value)
        .map_err(|e| ApiError::ExecutionError(format!("unserializable script result: {}", e)))
}

fn unwrap_script_error(error: EvalAltResult, timeout_ms: u64) -> ApiError {
    match error {
        EvalAltResult::ErrorTerminated(..) => ApiError::Timeout(timeout_ms),
        EvalAltResult::ErrorRuntime(payload, position) => {
            match payload.clone().try_cast::<ApiError>() {
                Some(api_error) => api_error,
                None => ApiError::ExecutionError(format!("{} ({})", payload, position)),
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => {
            unwrap_script_error(*inner, timeout_ms)
        }
        other => ApiError::ExecutionError(other.to_string()),
    }
}
