//! Runtime host: the engine instance and the shared environment.

use std::fs;
use std::path::Path;

use mlua::{Lua, LuaOptions, StdLib, Value, Variadic};
use tracing::debug;

use crate::config::Config;
use crate::datetime::format_now;
use crate::env::Environment;
use crate::output::{OutputHandle, OutputSource};
use crate::value::{display_value, join_display};
use crate::{ModHostError, Result};

/// Resolve configured library names to engine library flags.
pub fn library_flags(names: &[String]) -> Result<StdLib> {
    let mut libs = StdLib::NONE;
    for name in names {
        libs |= match name.to_lowercase().as_str() {
            "coroutine" => StdLib::COROUTINE,
            "table" => StdLib::TABLE,
            "string" => StdLib::STRING,
            "utf8" => StdLib::UTF8,
            "math" => StdLib::MATH,
            "os" => StdLib::OS,
            "io" => StdLib::IO,
            "package" => StdLib::PACKAGE,
            other => {
                return Err(ModHostError::Config(format!(
                    "unknown engine library '{}'",
                    other
                )))
            }
        };
    }
    Ok(libs)
}

/// Owns the engine and the environment shared by every module.
///
/// The engine is single-threaded; `RuntimeHost` is `!Send`, so every
/// compile/execute call happens on the thread that created it.
pub struct RuntimeHost {
    globals: Environment,
    shared: Environment,
    output: OutputHandle,
    lua: Lua,
}

impl RuntimeHost {
    /// Start the engine and populate the shared environment with
    /// `log`, `print`, `current_time` and `_G`.
    pub fn new(config: &Config, output: OutputHandle) -> Result<Self> {
        let libs = library_flags(&config.engine.libraries)?;
        let lua = Lua::new_with(libs, LuaOptions::default())
            .map_err(|e| ModHostError::Engine(format!("failed to start engine: {e}")))?;

        let globals = Environment::globals(&lua);
        let shared = Environment::create_child(&lua, &globals, "shared")?;

        let host = Self {
            globals,
            shared,
            output,
            lua,
        };
        host.install_shared_api(config)?;
        debug!(libraries = ?config.engine.libraries, "runtime host initialized");

        Ok(host)
    }

    fn install_shared_api(&self, config: &Config) -> Result<()> {
        let shared = &self.shared;
        shared.set_local("_G", shared.table().clone())?;

        // log(message)
        let output = self.output.clone();
        let log_fn = self.lua.create_function(move |lua, message: Value| {
            output.info(OutputSource::Shared, display_value(lua, &message));
            Ok(())
        })?;
        shared.set_local("log", log_fn)?;

        // current_time()
        let timezone = config.output.timezone.clone();
        let clock_format = config.output.clock_format.clone();
        let time_fn = self
            .lua
            .create_function(move |_, ()| {
                format_now(&timezone, &clock_format).map_err(|_| {
                    mlua::Error::RuntimeError(format!("invalid clock format '{}'", clock_format))
                })
            })?;
        shared.set_local("current_time", time_fn)?;

        self.install_print(shared, OutputSource::Shared)
    }

    /// Bind a `print(...)` in `env` that forwards tab-joined text tagged with `source`.
    pub fn install_print(&self, env: &Environment, source: OutputSource) -> Result<()> {
        let output = self.output.clone();
        let print_fn = self.lua.create_function(move |lua, args: Variadic<Value>| {
            let values = args.into_iter().collect();
            output.info(source.clone(), join_display(lua, &values));
            Ok(())
        })?;
        env.set_local("print", print_fn)
    }

    /// Compile and run `source` with `env` as its environment.
    ///
    /// Engine faults come back as [`ModHostError::Engine`].
    pub fn run(&self, source: &str, chunk_name: &str, env: &Environment) -> Result<Value> {
        self.lua
            .load(source)
            .set_name(chunk_name)
            .set_environment(env.table().clone())
            .call::<Value>(())
            .map_err(|e| ModHostError::Engine(e.to_string()))
    }

    /// Read a script file and run it with `env` as its environment.
    pub fn run_file(&self, path: &Path, env: &Environment) -> Result<Value> {
        let source = fs::read(path)?;
        self.lua
            .load(&source[..])
            .set_name(format!("@{}", path.display()))
            .set_environment(env.table().clone())
            .call::<Value>(())
            .map_err(|e| ModHostError::Engine(e.to_string()))
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn shared(&self) -> &Environment {
        &self.shared
    }

    pub fn output(&self) -> &OutputHandle {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, OutputRouter};
    use mlua::FromLua;

    fn host() -> (RuntimeHost, OutputRouter, MemorySink) {
        let sink = MemorySink::new();
        let router = OutputRouter::spawn(sink.clone()).unwrap();
        let host = RuntimeHost::new(&Config::default(), router.handle()).unwrap();
        (host, router, sink)
    }

    #[test]
    fn test_library_flags() {
        let names = vec!["string".to_string(), "MATH".to_string()];
        assert!(library_flags(&names).is_ok());
        assert!(library_flags(&["ffi".to_string()]).is_err());
        assert!(library_flags(&["debug".to_string()]).is_err());
    }

    #[test]
    fn test_standard_libraries_available() {
        let (host, _router, _sink) = host();
        let value = host
            .run(
                "return string.upper('a') .. math.floor(2.5) .. #table.pack(1, 2)",
                "=test",
                host.shared(),
            )
            .unwrap();
        assert_eq!(String::from_lua(value, host.lua()).unwrap(), "A22");
    }

    #[test]
    fn test_libraries_not_configured_are_absent() {
        let sink = MemorySink::new();
        let router = OutputRouter::spawn(sink).unwrap();
        let mut config = Config::default();
        config.engine.libraries = vec!["string".to_string()];
        let host = RuntimeHost::new(&config, router.handle()).unwrap();

        let value = host.run("return os == nil", "=test", host.shared()).unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn test_log_tagged_shared() {
        let (host, router, sink) = host();
        host.run("log('hello')", "=test", host.shared()).unwrap();
        router.flush();

        let events = sink.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, OutputSource::Shared);
        assert_eq!(events[0].text, "hello");
    }

    #[test]
    fn test_current_time_format() {
        let (host, _router, _sink) = host();
        let value = host.run("return current_time()", "=test", host.shared()).unwrap();
        let text = String::from_lua(value, host.lua()).unwrap();
        assert_eq!(text.len(), "2024-01-15 10:30:00".len());
    }

    #[test]
    fn test_current_time_rejected_format_raises() {
        let router = OutputRouter::spawn(MemorySink::new()).unwrap();
        let mut config = Config::default();
        config.output.clock_format = "%Q".to_string();
        let host = RuntimeHost::new(&config, router.handle()).unwrap();

        let err = host
            .run("return current_time()", "=test", host.shared())
            .unwrap_err();
        assert!(matches!(err, ModHostError::Engine(_)));
        assert!(err.to_string().contains("invalid clock format"));

        // Scripts can recover from it
        let value = host
            .run("return (pcall(current_time))", "=test", host.shared())
            .unwrap();
        assert_eq!(value, Value::Boolean(false));
    }

    #[test]
    fn test_shared_writes_do_not_touch_globals() {
        let (host, _router, _sink) = host();
        host.run("x = 1", "=test", host.shared()).unwrap();

        assert!(host.shared().contains_local("x").unwrap());
        assert!(host.globals().get("x").unwrap().is_none());
    }

    #[test]
    fn test_shared_g_is_shared_env() {
        let (host, _router, _sink) = host();
        let value = host.run("return _G == _ENV", "=test", host.shared()).unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn test_run_syntax_error_is_engine_error() {
        let (host, _router, _sink) = host();
        let result = host.run("this is not valid lua", "=test", host.shared());
        assert!(matches!(result, Err(ModHostError::Engine(_))));
    }

    #[test]
    fn test_run_runtime_error_is_engine_error() {
        let (host, _router, _sink) = host();
        let err = host
            .run("error('test error')", "=test", host.shared())
            .unwrap_err();
        assert!(err.to_string().contains("test error"));
    }

    #[test]
    fn test_run_file() {
        let (host, _router, _sink) = host();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.lua");
        std::fs::write(&path, "answer = 42\nreturn answer").unwrap();

        let value = host.run_file(&path, host.shared()).unwrap();
        assert_eq!(value, Value::Integer(42));
    }

    #[test]
    fn test_run_file_missing() {
        let (host, _router, _sink) = host();
        let result = host.run_file(Path::new("/nonexistent/x.lua"), host.shared());
        assert!(matches!(result, Err(ModHostError::Io(_))));
    }
}
