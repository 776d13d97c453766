//! Module registry: named modules and their environments.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mlua::{Lua, Table, Value};
use tracing::info;

use crate::env::Environment;
use crate::gateway::ExecutionGateway;
use crate::output::OutputSource;
use crate::runtime::RuntimeHost;
use crate::{ModHostError, Result};

/// Registry key of the engine-side table mapping module names to their
/// environment tables. Exposure aliases resolve through it on every access.
const NAMESPACE_DIRECTORY: &str = "modhost.namespaces";

/// Where a module's source text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A script file, read again on every load and reload.
    File(PathBuf),
    /// Source text held in memory.
    Inline(String),
}

impl ScriptSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ScriptSource::File(path.into())
    }

    pub fn inline(text: impl Into<String>) -> Self {
        ScriptSource::Inline(text.into())
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ScriptSource::File(path) => Some(path),
            ScriptSource::Inline(_) => None,
        }
    }
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::File(path) => write!(f, "{}", path.display()),
            ScriptSource::Inline(_) => write!(f, "<inline>"),
        }
    }
}

/// A loaded module.
#[derive(Debug)]
pub struct Module {
    name: String,
    source: ScriptSource,
    env: Environment,
    loaded_at: DateTime<Utc>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Tracks loaded modules. The only place modules are created or destroyed.
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
    directory: Table,
}

impl ModuleRegistry {
    /// Create an empty registry and publish its namespace directory to the engine.
    pub fn new(runtime: &RuntimeHost) -> Result<Self> {
        let directory = runtime.lua().create_table()?;
        runtime
            .lua()
            .set_named_registry_value(NAMESPACE_DIRECTORY, directory.clone())?;

        Ok(Self {
            modules: HashMap::new(),
            directory,
        })
    }

    /// Load a module under `name`.
    ///
    /// Fails with [`ModHostError::DuplicateModule`] before touching the engine
    /// if the name is taken. If the script fails, nothing is registered.
    pub fn load(&mut self, runtime: &RuntimeHost, name: &str, source: ScriptSource) -> Result<()> {
        if self.modules.contains_key(name) {
            return Err(ModHostError::DuplicateModule(name.to_string()));
        }

        let load_error = |e: ModHostError| ModHostError::Load {
            module: name.to_string(),
            message: e.detail(),
        };

        let env = Environment::create_child(runtime.lua(), runtime.shared(), name)
            .map_err(load_error)?;
        env.set_local("_MODULE", name).map_err(load_error)?;
        runtime
            .install_print(&env, OutputSource::Module(name.to_string()))
            .map_err(load_error)?;

        ExecutionGateway::new(runtime)
            .run_source(&env, &source, name)
            .map_err(load_error)?;

        self.directory
            .raw_set(name, env.table().clone())
            .map_err(|e| load_error(e.into()))?;
        self.modules.insert(
            name.to_string(),
            Module {
                name: name.to_string(),
                source,
                env,
                loaded_at: Utc::now(),
            },
        );
        info!(module = name, "module loaded");

        Ok(())
    }

    /// Remove a module. Returns `false` if it was not loaded.
    pub fn unload(&mut self, name: &str) -> Result<bool> {
        if self.modules.remove(name).is_none() {
            return Ok(false);
        }
        self.directory.raw_set(name, Value::Nil)?;
        info!(module = name, "module unloaded");
        Ok(true)
    }

    /// Remove every module. Returns how many were removed.
    pub fn unload_all(&mut self) -> Result<usize> {
        let count = self.modules.len();
        for name in self.modules.keys() {
            self.directory.raw_set(name.as_str(), Value::Nil)?;
        }
        self.modules.clear();
        info!(count, "all modules unloaded");
        Ok(count)
    }

    /// Unload a module and load it again from its recorded source.
    pub fn reload(&mut self, runtime: &RuntimeHost, name: &str) -> Result<()> {
        let source = self
            .modules
            .get(name)
            .map(|module| module.source.clone())
            .ok_or_else(|| ModHostError::ModuleNotFound(name.to_string()))?;
        self.unload(name)?;
        self.load(runtime, name, source)
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of the loaded modules, in no particular order.
    pub fn list(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Resolve a module's environment table by name from inside the engine.
pub fn lookup_namespace(lua: &Lua, name: &str) -> mlua::Result<Option<Table>> {
    let directory: Table = lua.named_registry_value(NAMESPACE_DIRECTORY)?;
    directory.raw_get(name)
}
