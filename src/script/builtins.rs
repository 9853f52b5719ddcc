//! Built-in script modules.
//!
//! Every scope gets `log` (tracing-backed) and `assert` (request
//! validation helpers that fail the script with a clear message). Both are
//! stateless shared instances, safe for concurrent use.

use rhai::{Dynamic, Engine};

use crate::error::ApiError;
use crate::script::host::{into_script_error, ScriptModule};

/// `log.info("...")` and friends, emitted under the `dynapi::script` target.
#[derive(Debug, Clone, Copy)]
pub struct LogModule;

impl ScriptModule for LogModule {
    fn register(&self, engine: &mut Engine) {
        engine.register_type_with_name::<LogModule>("Log");
        engine.register_fn("debug", |_: &mut LogModule, message: &str| {
            tracing::debug!(target: "dynapi::script", "{}", message);
        });
        engine.register_fn("info", |_: &mut LogModule, message: &str| {
            tracing::info!(target: "dynapi::script", "{}", message);
        });
        engine.register_fn("warn", |_: &mut LogModule, message: &str| {
            tracing::warn!(target: "dynapi::script", "{}", message);
        });
        engine.register_fn("error", |_: &mut LogModule, message: &str| {
            tracing::error!(target: "dynapi::script", "{}", message);
        });
    }

    fn instance(&self) -> Dynamic {
        Dynamic::from(LogModule)
    }
}

/// `assert.is_true(cond, "msg")` style guards; a failed assertion fails
/// the script with an execution error carrying the message.
#[derive(Debug, Clone, Copy)]
pub struct AssertModule;

type ScriptResult<T> = Result<T, Box<rhai::EvalAltResult>>;

impl ScriptModule for AssertModule {
    fn register(&self, engine: &mut Engine) {
        engine.register_type_with_name::<AssertModule>("Assert");
        engine.register_fn(
            "is_true",
            |_: &mut AssertModule, condition: bool, message: &str| -> ScriptResult<()> {
                if condition {
                    Ok(())
                } else {
                    Err(into_script_error(ApiError::ExecutionError(message.to_string())))
                }
            },
        );
        engine.register_fn(
            "not_null",
            |_: &mut AssertModule, value: Dynamic, message: &str| -> ScriptResult<()> {
                if value.is_unit() {
                    Err(into_script_error(ApiError::ExecutionError(message.to_string())))
                } else {
                    Ok(())
                }
            },
        );
        engine.register_fn(
            "not_empty",
            |_: &mut AssertModule, value: &str, message: &str| -> ScriptResult<()> {
                if value.is_empty() {
                    Err(into_script_error(ApiError::ExecutionError(message.to_string())))
                } else {
                    Ok(())
                }
            },
        );
    }

    fn instance(&self) -> Dynamic {
        Dynamic::from(AssertModule)
    }
}
