//! Exposure broker: explicit cross-module namespace aliases.
//!
//! An alias is a proxy table whose metamethods look the source module up by
//! name on every access, so it always sees the module's current bindings and
//! resolves to `nil` once the module is unloaded.

use mlua::{Function, Lua, Table, Value};
use tracing::info;

use crate::output::OutputSource;
use crate::registry::{lookup_namespace, ModuleRegistry};
use crate::runtime::RuntimeHost;
use crate::{ModHostError, Result};

/// Bind `alias` inside `target` to a live view of `source`'s namespace.
pub fn expose(
    runtime: &RuntimeHost,
    registry: &ModuleRegistry,
    target: &str,
    source: &str,
    alias: &str,
) -> Result<()> {
    let target_module = registry
        .get(target)
        .ok_or_else(|| ModHostError::ModuleNotFound(target.to_string()))?;
    if !registry.contains(source) {
        return Err(ModHostError::ModuleNotFound(source.to_string()));
    }

    let expose_error = |message: String| ModHostError::Expose {
        target: target.to_string(),
        source_module: source.to_string(),
        message,
    };

    let proxy = namespace_proxy(runtime.lua(), source).map_err(|e| expose_error(e.to_string()))?;
    target_module
        .env()
        .set_local(alias, proxy)
        .map_err(|e| expose_error(e.detail()))?;

    info!(target_module = target, source_module = source, alias, "module exposed");
    runtime.output().info(
        OutputSource::Module(target.to_string()),
        format!("imported module {} as {}", source, alias),
    );
    Ok(())
}

/// Build the proxy table standing in for `source`'s namespace.
fn namespace_proxy(lua: &Lua, source: &str) -> mlua::Result<Table> {
    let proxy = lua.create_table()?;
    let meta = lua.create_table()?;

    let name = source.to_string();
    let index = lua.create_function(move |lua, (_proxy, key): (Table, Value)| {
        match lookup_namespace(lua, &name)? {
            Some(namespace) => namespace.get::<Value>(key),
            None => Ok(Value::Nil),
        }
    })?;
    meta.raw_set("__index", index)?;

    // Writes land in the source module's own level
    let name = source.to_string();
    let newindex =
        lua.create_function(move |lua, (_proxy, key, value): (Table, Value, Value)| {
            match lookup_namespace(lua, &name)? {
                Some(namespace) => namespace.raw_set(key, value),
                None => Err(mlua::Error::RuntimeError(format!(
                    "module '{}' is not loaded",
                    name
                ))),
            }
        })?;
    meta.raw_set("__newindex", newindex)?;

    // Iterates the source's own bindings; nothing once it is unloaded
    let name = source.to_string();
    let pairs = lua.create_function(move |lua, _proxy: Table| {
        let next: Function = lua.globals().raw_get("next")?;
        let namespace = match lookup_namespace(lua, &name)? {
            Some(namespace) => namespace,
            None => lua.create_table()?,
        };
        Ok((next, namespace, Value::Nil))
    })?;
    meta.raw_set("__pairs", pairs)?;

    let name = source.to_string();
    let tostring = lua.create_function(move |lua, _proxy: Table| {
        let state = if lookup_namespace(lua, &name)?.is_some() {
            "loaded"
        } else {
            "unloaded"
        };
        Ok(format!("module '{}' ({})", name, state))
    })?;
    meta.raw_set("__tostring", tostring)?;

    proxy.set_metatable(Some(meta));
    Ok(proxy)
}
