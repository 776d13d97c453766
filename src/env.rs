//! Execution environments and their inheritance chain.
//!
//! An environment is a Lua table whose metatable `__index` points at its
//! parent, so reads fall through `module -> shared -> engine globals` while
//! writes from script code land in the local table.

use std::fmt;

use mlua::{FromLua, IntoLua, Lua, Table, Value};

use crate::{ModHostError, Result};

/// Position of an environment in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvLevel {
    /// The engine's own global table.
    Globals,
    /// The single environment shared by every module.
    Shared,
    /// A module's private environment.
    Module,
}

impl EnvLevel {
    /// Level of a child created under this one, if children are allowed.
    fn child(self) -> Option<EnvLevel> {
        match self {
            EnvLevel::Globals => Some(EnvLevel::Shared),
            EnvLevel::Shared => Some(EnvLevel::Module),
            EnvLevel::Module => None,
        }
    }
}

/// A named lookup/write context.
#[derive(Clone)]
pub struct Environment {
    name: String,
    level: EnvLevel,
    table: Table,
}

impl Environment {
    /// Wrap the engine's global table as the root of every chain.
    pub fn globals(lua: &Lua) -> Self {
        Self {
            name: "_G".to_string(),
            level: EnvLevel::Globals,
            table: lua.globals(),
        }
    }

    /// Create an environment whose reads fall back to `parent`.
    ///
    /// Shared environments are children of the globals and module
    /// environments are children of the shared one; nothing can be created
    /// below a module.
    pub fn create_child(lua: &Lua, parent: &Environment, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let level = parent.level.child().ok_or_else(|| {
            ModHostError::Engine(format!(
                "cannot create environment '{}' below module environment '{}'",
                name, parent.name
            ))
        })?;

        let table = lua.create_table()?;
        let meta = lua.create_table()?;
        meta.raw_set("__index", parent.table.clone())?;
        table.set_metatable(Some(meta));

        Ok(Self { name, level, table })
    }

    /// Bind `key` in this environment only.
    pub fn set_local(&self, key: impl IntoLua, value: impl IntoLua) -> Result<()> {
        self.table.raw_set(key, value)?;
        Ok(())
    }

    /// Look `key` up, walking the chain outward. `None` if undefined everywhere.
    pub fn get(&self, key: impl IntoLua) -> Result<Option<Value>> {
        match self.table.get::<Value>(key)? {
            Value::Nil => Ok(None),
            value => Ok(Some(value)),
        }
    }

    /// Look `key` up and convert it to `V`.
    pub fn get_as<V: FromLua>(&self, key: impl IntoLua) -> Result<V> {
        Ok(self.table.get::<V>(key)?)
    }

    /// Look `key` up in this level only.
    pub fn get_local(&self, key: impl IntoLua) -> Result<Option<Value>> {
        match self.table.raw_get::<Value>(key)? {
            Value::Nil => Ok(None),
            value => Ok(Some(value)),
        }
    }

    pub fn contains_local(&self, key: impl IntoLua) -> Result<bool> {
        Ok(self.get_local(key)?.is_some())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> EnvLevel {
        self.level
    }

    /// The backing table, for binding as a chunk environment.
    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish()
    }
}
