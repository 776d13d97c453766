//! Display conversion for engine values.

use mlua::{Function, Lua, MultiValue, Value};

/// Convert a value to display text the way Lua's `tostring` does.
///
/// Honors `__tostring` metamethods. Falls back to a plain rendering if
/// `tostring` is unavailable or itself raises.
pub fn display_value(lua: &Lua, value: &Value) -> String {
    let converted = lua
        .globals()
        .raw_get::<Function>("tostring")
        .and_then(|tostring| tostring.call::<Option<String>>(value.clone()));
    match converted {
        Ok(Some(text)) => text,
        _ => fallback_display(value),
    }
}

/// Tab-join a list of values for `print`-style output. `nil` renders as "nil".
pub fn join_display(lua: &Lua, values: &MultiValue) -> String {
    values
        .iter()
        .map(|value| display_value(lua, value))
        .collect::<Vec<_>>()
        .join("\t")
}

fn fallback_display(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_str().map(|s| s.to_string()).unwrap_or_default(),
        Value::Table(_) => "[table]".to_string(),
        Value::Function(_) => "[function]".to_string(),
        Value::Thread(_) => "[thread]".to_string(),
        Value::UserData(_) => "[userdata]".to_string(),
        Value::LightUserData(_) => "[lightuserdata]".to_string(),
        Value::Error(e) => format!("[error: {}]", e),
        _ => "[unknown]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        let lua = Lua::new();
        assert_eq!(display_value(&lua, &Value::Nil), "nil");
        assert_eq!(display_value(&lua, &Value::Boolean(true)), "true");
        assert_eq!(display_value(&lua, &Value::Integer(42)), "42");
        assert_eq!(display_value(&lua, &Value::Number(1.5)), "1.5");

        let s = lua.create_string("hi").unwrap();
        assert_eq!(display_value(&lua, &Value::String(s)), "hi");
    }

    #[test]
    fn test_display_honors_tostring_metamethod() {
        let lua = Lua::new();
        let value: Value = lua
            .load(r#"return setmetatable({}, { __tostring = function() return "custom" end })"#)
            .eval()
            .unwrap();
        assert_eq!(display_value(&lua, &value), "custom");
    }

    #[test]
    fn test_display_table_default() {
        let lua = Lua::new();
        let table = Value::Table(lua.create_table().unwrap());
        assert!(display_value(&lua, &table).starts_with("table: "));
    }

    #[test]
    fn test_join_display_nil_safe() {
        let lua = Lua::new();
        let values: MultiValue = lua.load(r#"return 1, nil, "x", false"#).eval().unwrap();
        assert_eq!(join_display(&lua, &values), "1\tnil\tx\tfalse");
    }

    #[test]
    fn test_fallback_without_tostring() {
        let lua = Lua::new();
        lua.globals().set("tostring", Value::Nil).unwrap();
        assert_eq!(display_value(&lua, &Value::Integer(7)), "7");
        assert_eq!(display_value(&lua, &Value::Nil), "nil");
    }
}
