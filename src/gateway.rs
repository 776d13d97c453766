//! Execution gateway.
//!
//! Every script run and function call goes through here, so engine faults
//! always come back as typed errors and never unwind into the host.

use mlua::{AnyUserData, IntoLuaMulti, MultiValue, ObjectLike, Table, Value};
use tracing::debug;

use crate::env::Environment;
use crate::output::OutputSource;
use crate::registry::{ModuleRegistry, ScriptSource};
use crate::runtime::RuntimeHost;
use crate::{ModHostError, Result};

/// Runs code against environments owned by the runtime and registry.
pub struct ExecutionGateway<'a> {
    runtime: &'a RuntimeHost,
}

impl<'a> ExecutionGateway<'a> {
    pub fn new(runtime: &'a RuntimeHost) -> Self {
        Self { runtime }
    }

    /// Run a module source inside `env`.
    pub fn run_source(&self, env: &Environment, source: &ScriptSource, name: &str) -> Result<Value> {
        match source {
            ScriptSource::File(path) => self.runtime.run_file(path, env),
            ScriptSource::Inline(text) => self.runtime.run(text, &format!("={}", name), env),
        }
    }

    /// Call `function` from `module`'s environment with `args`.
    ///
    /// A fault raised by the function becomes [`ModHostError::Call`]; the
    /// module stays loaded.
    pub fn call_function(
        &self,
        registry: &ModuleRegistry,
        module: &str,
        function: &str,
        args: impl IntoLuaMulti,
    ) -> Result<MultiValue> {
        let entry = registry
            .get(module)
            .ok_or_else(|| ModHostError::ModuleNotFound(module.to_string()))?;

        let call_error = |message: String| ModHostError::Call {
            module: module.to_string(),
            function: function.to_string(),
            message,
        };

        let binding = entry.env().get(function).map_err(|e| call_error(e.detail()))?;
        let not_found = || ModHostError::FunctionNotFound {
            module: module.to_string(),
            function: function.to_string(),
        };

        debug!(module, function, "calling module function");
        let result = match binding {
            Some(Value::Function(func)) => func.call::<MultiValue>(args),
            Some(Value::Table(table)) if table_is_callable(&table).unwrap_or(false) => {
                table.call::<MultiValue>(args)
            }
            Some(Value::UserData(ud)) if userdata_is_callable(&ud).unwrap_or(false) => {
                ud.call::<MultiValue>(args)
            }
            _ => return Err(not_found()),
        };
        result.map_err(|e| call_error(e.to_string()))
    }

    /// Run a one-off snippet inside a module's environment.
    pub fn execute_in_module(&self, registry: &ModuleRegistry, module: &str, text: &str) -> Result<()> {
        let entry = registry
            .get(module)
            .ok_or_else(|| ModHostError::ModuleNotFound(module.to_string()))?;

        self.runtime
            .run(text, &format!("={}", module), entry.env())
            .map(|_| ())
            .map_err(|e| ModHostError::Exec {
                scope: OutputSource::Module(module.to_string()),
                message: e.detail(),
            })
    }

    /// Run a one-off snippet inside the shared environment.
    pub fn execute_shared(&self, text: &str) -> Result<()> {
        self.runtime
            .run(text, "=shared", self.runtime.shared())
            .map(|_| ())
            .map_err(|e| ModHostError::Exec {
                scope: OutputSource::Shared,
                message: e.detail(),
            })
    }
}

/// Tables are callable through a `__call` metamethod.
fn table_is_callable(table: &Table) -> mlua::Result<bool> {
    match table.metatable() {
        Some(meta) => Ok(!meta.raw_get::<Value>("__call")?.is_nil()),
        None => Ok(false),
    }
}

fn userdata_is_callable(ud: &AnyUserData) -> mlua::Result<bool> {
    ud.metatable()?.contains("__call")
}
