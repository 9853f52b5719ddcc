//! Shared script engine host.
//!
//! # Responsibilities
//! - Build the one rhai `Engine` all dispatches share
//! - Register the `db` query surface and collaborator modules/extensions
//! - Compile endpoint scripts eagerly at registration time
//!
//! # Design Decisions
//! - The engine is built once and never mutated afterwards; everything
//!   per-request lives in the `Scope`, so concurrent executions share only
//!   read-only state
//! - Datasource failures cross the engine boundary as a typed payload so
//!   the dispatcher can report `PoolExhausted`/`QueryError` instead of a
//!   generic script failure
//! - The progress hook consults a thread-local deadline, which lets one
//!   shared engine enforce a different budget per in-flight execution

use std::sync::Arc;
use std::time::Duration;

use rhai::{Dynamic, Engine, EvalAltResult, Position, AST};
use rusqlite::types::Value as SqlValue;

use crate::datasource::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::script::builtins::{AssertModule, LogModule};
use crate::script::executor::deadline_exceeded;

/// A compiled endpoint script, cached alongside its endpoint and
/// recompiled only on redefinition.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub(crate) ast: Arc<AST>,
}

/// A named capability module visible to scripts.
///
/// A module contributes method registrations on the shared engine plus one
/// shared read-only instance pushed into every scope under the module's
/// name. Instances are shared across concurrent requests and must be safe
/// for concurrent read access.
pub trait ScriptModule: Send + Sync {
    fn register(&self, engine: &mut Engine);

    fn instance(&self) -> Dynamic;
}

/// A type-extension capability: adds methods to existing script types on
/// the shared engine before first dispatch.
pub trait ScriptExtension: Send + Sync {
    fn register(&self, engine: &mut Engine);
}

/// The shared engine plus the module instances injected into every scope.
pub struct ScriptHost {
    pub(crate) engine: Arc<Engine>,
    pub(crate) modules: Vec<(String, Dynamic)>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    /// Host with only the built-in `log` and `assert` modules.
    pub fn new() -> Self {
        Self::build(&[], &[])
    }

    /// Host with the built-ins plus collaborator modules and extensions.
    pub fn build(
        modules: &[(String, Arc<dyn ScriptModule>)],
        extensions: &[Arc<dyn ScriptExtension>],
    ) -> Self {
        let mut engine = Engine::new();
        register_db_api(&mut engine);

        let mut shared: Vec<(String, Dynamic)> = Vec::new();

        let builtins: [(&str, Arc<dyn ScriptModule>); 2] = [
            ("log", Arc::new(LogModule)),
            ("assert", Arc::new(AssertModule)),
        ];
        for (name, module) in builtins {
            module.register(&mut engine);
            shared.push((name.to_string(), module.instance()));
        }
        for (name, module) in modules {
            tracing::info!(module = %name, "registering script module");
            module.register(&mut engine);
            shared.push((name.clone(), module.instance()));
        }
        for extension in extensions {
            extension.register(&mut engine);
        }

        // Terminates the running script once its deadline passes; the
        // deadline is per-thread, set by the executor around each eval.
        engine.on_progress(|_| {
            if deadline_exceeded() {
                Some(Dynamic::from("deadline"))
            } else {
                None
            }
        });

        Self {
            engine: Arc::new(engine),
            modules: shared,
        }
    }

    /// Compile a script body. Failures surface as `CompileError` and are
    /// rejected before anything reaches the route registry.
    pub fn compile(&self, source: &str) -> ApiResult<CompiledScript> {
        self.engine
            .compile(source)
            .map(|ast| CompiledScript { ast: Arc::new(ast) })
            .map_err(|e| ApiError::CompileError(e.to_string()))
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("modules", &self.modules.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// Carry an `ApiError` across the engine boundary as a typed payload.
pub(crate) fn into_script_error(err: ApiError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(err), Position::NONE))
}

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

fn register_db_api(engine: &mut Engine) {
    engine.register_type_with_name::<DbClient>("Db");

    engine.register_fn("select", |db: &mut DbClient, sql: &str| -> ScriptResult<Dynamic> {
        json_to_dynamic(db.select(sql, &[]).map_err(into_script_error)?)
    });
    engine.register_fn(
        "select",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<Dynamic> {
            let params = to_sql_params(params)?;
            json_to_dynamic(db.select(sql, &params).map_err(into_script_error)?)
        },
    );

    engine.register_fn("select_one", |db: &mut DbClient, sql: &str| -> ScriptResult<Dynamic> {
        json_to_dynamic(db.select_one(sql, &[]).map_err(into_script_error)?)
    });
    engine.register_fn(
        "select_one",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<Dynamic> {
            let params = to_sql_params(params)?;
            json_to_dynamic(db.select_one(sql, &params).map_err(into_script_error)?)
        },
    );

    engine.register_fn("select_value", |db: &mut DbClient, sql: &str| -> ScriptResult<Dynamic> {
        json_to_dynamic(db.select_value(sql, &[]).map_err(into_script_error)?)
    });
    engine.register_fn(
        "select_value",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<Dynamic> {
            let params = to_sql_params(params)?;
            json_to_dynamic(db.select_value(sql, &params).map_err(into_script_error)?)
        },
    );

    engine.register_fn("select_int", |db: &mut DbClient, sql: &str| -> ScriptResult<i64> {
        db.select_int(sql, &[]).map_err(into_script_error)
    });
    engine.register_fn(
        "select_int",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<i64> {
            let params = to_sql_params(params)?;
            db.select_int(sql, &params).map_err(into_script_error)
        },
    );

    engine.register_fn("update", |db: &mut DbClient, sql: &str| -> ScriptResult<i64> {
        Ok(db.update(sql, &[]).map_err(into_script_error)? as i64)
    });
    engine.register_fn(
        "update",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<i64> {
            let params = to_sql_params(params)?;
            Ok(db.update(sql, &params).map_err(into_script_error)? as i64)
        },
    );

    engine.register_fn("insert", |db: &mut DbClient, sql: &str| -> ScriptResult<i64> {
        db.insert(sql, &[]).map_err(into_script_error)
    });
    engine.register_fn(
        "insert",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<i64> {
            let params = to_sql_params(params)?;
            db.insert(sql, &params).map_err(into_script_error)
        },
    );

    engine.register_fn("page", |db: &mut DbClient, sql: &str| -> ScriptResult<Dynamic> {
        json_to_dynamic(db.page(sql, &[]).map_err(into_script_error)?)
    });
    engine.register_fn(
        "page",
        |db: &mut DbClient, sql: &str, params: rhai::Array| -> ScriptResult<Dynamic> {
            let params = to_sql_params(params)?;
            json_to_dynamic(db.page(sql, &params).map_err(into_script_error)?)
        },
    );

    engine.register_fn("cache", |db: &mut DbClient| -> DbClient { db.with_cache(None) });
    engine.register_fn("cache", |db: &mut DbClient, ttl_secs: i64| -> DbClient {
        db.with_cache(Some(Duration::from_secs(ttl_secs.max(0) as u64)))
    });

    engine.register_fn("source", |db: &mut DbClient, name: &str| -> ScriptResult<DbClient> {
        db.with_source(name).map_err(into_script_error)
    });
}

fn json_to_dynamic(value: serde_json::Value) -> ScriptResult<Dynamic> {
    rhai::serde::to_dynamic(value)
}

fn to_sql_params(params: rhai::Array) -> ScriptResult<Vec<SqlValue>> {
    params
        .into_iter()
        .map(|value| {
            if value.is_unit() {
                Ok(SqlValue::Null)
            } else if let Ok(i) = value.as_int() {
                Ok(SqlValue::Integer(i))
            } else if let Ok(f) = value.as_float() {
                Ok(SqlValue::Real(f))
            } else if let Ok(b) = value.as_bool() {
                Ok(SqlValue::Integer(b as i64))
            } else if let Ok(s) = value.clone().into_string() {
                Ok(SqlValue::Text(s))
            } else {
                Err(into_script_error(ApiError::ExecutionError(format!(
                    "unsupported query parameter type: {}",
                    value.type_name()
                ))))
            }
        })
        .collect()
}
