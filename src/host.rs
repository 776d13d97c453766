//! Module host: the command surface over runtime, registry and output.

use std::path::PathBuf;

use mlua::{IntoLuaMulti, LuaSerdeExt, MultiValue};
use tracing::{info, warn};

use crate::config::Config;
use crate::expose;
use crate::gateway::ExecutionGateway;
use crate::output::{OutputRouter, OutputSink, OutputSource};
use crate::registry::{Module, ModuleRegistry, ScriptSource};
use crate::runtime::RuntimeHost;
use crate::value::join_display;
use crate::{ModHostError, Result};

/// Owns the engine, the loaded modules and the output router.
///
/// Every failed command is reported to the output sink as an error event
/// and also returned to the caller.
pub struct ModuleHost {
    // Dropped in declaration order; the router must outlive the engine.
    registry: ModuleRegistry,
    runtime: RuntimeHost,
    router: OutputRouter,
}

impl ModuleHost {
    /// Start the output router on `sink` and initialize the engine.
    pub fn new<S: OutputSink>(config: &Config, sink: S) -> Result<Self> {
        let router = OutputRouter::spawn(sink)?;
        let runtime = RuntimeHost::new(config, router.handle())?;
        let registry = ModuleRegistry::new(&runtime)?;
        info!("module host ready");

        Ok(Self {
            registry,
            runtime,
            router,
        })
    }

    /// Load a module from `source`.
    pub fn load(&mut self, name: &str, source: ScriptSource) -> Result<()> {
        let result = self.registry.load(&self.runtime, name, source);
        self.report(result)
    }

    pub fn load_file(&mut self, name: &str, path: impl Into<PathBuf>) -> Result<()> {
        self.load(name, ScriptSource::file(path))
    }

    pub fn load_text(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        self.load(name, ScriptSource::inline(text))
    }

    /// Unload a module. Unloading a module that is not loaded is a no-op.
    pub fn unload(&mut self, name: &str) -> Result<()> {
        let result = self.registry.unload(name).map(|_| ());
        self.report(result)
    }

    /// Unload every module and emit one confirmation event.
    pub fn unload_all(&mut self) -> Result<()> {
        let result = self.registry.unload_all();
        let count = self.report(result)?;
        self.runtime
            .output()
            .info(OutputSource::System, format!("unloaded {} modules", count));
        Ok(())
    }

    /// Unload and load a module again from its recorded source.
    pub fn reload(&mut self, name: &str) -> Result<()> {
        let result = self.registry.reload(&self.runtime, name);
        self.report(result)
    }

    /// Reload every loaded module, in name order.
    pub fn reload_all(&mut self) -> Vec<(String, Result<()>)> {
        let mut names = self.registry.list();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let result = self.reload(&name);
                (name, result)
            })
            .collect()
    }

    /// Call a function defined in (or visible from) a module.
    pub fn call_function(
        &self,
        module: &str,
        function: &str,
        args: impl IntoLuaMulti,
    ) -> Result<MultiValue> {
        let result = ExecutionGateway::new(&self.runtime).call_function(
            &self.registry,
            module,
            function,
            args,
        );
        self.report(result)
    }

    /// Call a module function with JSON arguments converted to engine values.
    pub fn call_function_json(
        &self,
        module: &str,
        function: &str,
        args: &[serde_json::Value],
    ) -> Result<MultiValue> {
        let lua = self.runtime.lua();
        let converted = args
            .iter()
            .map(|arg| lua.to_value(arg))
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(|e| ModHostError::Call {
                module: module.to_string(),
                function: function.to_string(),
                message: format!("invalid argument: {}", e),
            });
        match converted {
            Ok(values) => self.call_function(module, function, MultiValue::from_vec(values)),
            Err(e) => self.report(Err(e)),
        }
    }

    /// Run a snippet inside a module's environment.
    pub fn execute_in_module(&self, module: &str, text: &str) -> Result<()> {
        let result =
            ExecutionGateway::new(&self.runtime).execute_in_module(&self.registry, module, text);
        self.report(result)
    }

    /// Run a snippet inside the shared environment.
    pub fn execute_shared(&self, text: &str) -> Result<()> {
        let result = ExecutionGateway::new(&self.runtime).execute_shared(text);
        self.report(result)
    }

    /// Make `source`'s namespace visible as `alias` inside `target`.
    pub fn expose(&self, target: &str, source: &str, alias: &str) -> Result<()> {
        let result = expose::expose(&self.runtime, &self.registry, target, source, alias);
        self.report(result)
    }

    /// Names of the loaded modules, in no particular order.
    pub fn list_modules(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.registry.get(name)
    }

    /// Render call results the way `print` would.
    pub fn display(&self, values: &MultiValue) -> String {
        join_display(self.runtime.lua(), values)
    }

    /// Block until all output emitted so far has reached the sink.
    pub fn flush_output(&self) {
        self.router.flush();
    }

    pub fn runtime(&self) -> &RuntimeHost {
        &self.runtime
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("{}", e);
            self.runtime.output().error(e.output_source(), e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, Severity};

    fn host() -> (ModuleHost, MemorySink) {
        let sink = MemorySink::new();
        let host = ModuleHost::new(&Config::default(), sink.clone()).unwrap();
        (host, sink)
    }

    #[test]
    fn test_print_tagged_with_module() {
        let (mut host, sink) = host();
        host.load_text("alpha", "print('hello', 1, nil, true)").unwrap();
        host.flush_output();

        let events = sink.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, OutputSource::Module("alpha".to_string()));
        assert_eq!(events[0].severity, Severity::Info);
        assert_eq!(events[0].text, "hello\t1\tnil\ttrue");
    }

    #[test]
    fn test_errors_reported_once() {
        let (mut host, sink) = host();
        host.load_text("alpha", "").unwrap();
        sink.clear();

        assert!(host.load_text("alpha", "").is_err());
        assert!(host.call_function("alpha", "missing", ()).is_err());
        assert!(host.execute_shared("error('bad')").is_err());
        host.flush_output();

        let events = sink.snapshot();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.severity == Severity::Error));
        assert_eq!(events[0].source, OutputSource::Module("alpha".to_string()));
        assert_eq!(events[1].source, OutputSource::Module("alpha".to_string()));
        assert_eq!(events[2].source, OutputSource::Shared);
    }

    #[test]
    fn test_unload_absent_is_silent() {
        let (mut host, sink) = host();
        host.unload("ghost").unwrap();
        host.flush_output();
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_unload_all_single_event() {
        let (mut host, sink) = host();
        host.load_text("a", "").unwrap();
        host.load_text("b", "").unwrap();

        host.unload_all().unwrap();
        host.flush_output();

        let events = sink.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, OutputSource::System);
        assert_eq!(events[0].text, "unloaded 2 modules");
        assert!(host.list_modules().is_empty());
    }

    #[test]
    fn test_call_function_json() {
        let (mut host, _sink) = host();
        host.load_text(
            "alpha",
            "function sum(t) local s = 0 for _, v in ipairs(t) do s = s + v end return s end",
        )
        .unwrap();

        let args = vec![serde_json::json!([1, 2, 3])];
        let result = host.call_function_json("alpha", "sum", &args).unwrap();
        assert_eq!(host.display(&result), "6");
    }

    #[test]
    fn test_reload_all() {
        let (mut host, _sink) = host();
        host.load_text("b", "x = 1").unwrap();
        host.load_text("a", "x = 2").unwrap();

        let outcomes = host.reload_all();
        let names: Vec<&str> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(outcomes.iter().all(|(_, result)| result.is_ok()));
        assert!(host.is_loaded("a"));
        assert!(host.module("b").is_some());
    }
}
