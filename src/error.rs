//! Error types for modhost.

use thiserror::Error;

use crate::output::OutputSource;

/// Common error type for modhost.
#[derive(Error, Debug)]
pub enum ModHostError {
    /// Compile or runtime fault raised by the embedded engine.
    #[error("engine error: {0}")]
    Engine(String),

    /// A module with this name is already loaded.
    #[error("module '{0}' is already loaded")]
    DuplicateModule(String),

    /// No module with this name is loaded.
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// The binding is absent or not callable in the module's environment.
    #[error("function '{function}' not found in module '{module}'")]
    FunctionNotFound { module: String, function: String },

    /// Module source failed to compile or run; the module was not registered.
    #[error("failed to load module '{module}': {message}")]
    Load { module: String, message: String },

    /// A module function raised an error while being called.
    #[error("error calling '{function}' in module '{module}': {message}")]
    Call {
        module: String,
        function: String,
        message: String,
    },

    /// An ad-hoc snippet failed inside a module or the shared environment.
    #[error("script execution failed in {scope}: {message}")]
    Exec { scope: OutputSource, message: String },

    /// Binding an alias into the target module failed.
    #[error("failed to expose '{source_module}' to '{target}': {message}")]
    Expose {
        target: String,
        source_module: String,
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<mlua::Error> for ModHostError {
    fn from(e: mlua::Error) -> Self {
        ModHostError::Engine(e.to_string())
    }
}

impl ModHostError {
    /// The bare message, without the "engine error:" prefix for engine faults.
    pub fn detail(&self) -> String {
        match self {
            ModHostError::Engine(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// The output source a reported error is tagged with.
    pub fn output_source(&self) -> OutputSource {
        match self {
            ModHostError::DuplicateModule(name) | ModHostError::ModuleNotFound(name) => {
                OutputSource::Module(name.clone())
            }
            ModHostError::FunctionNotFound { module, .. }
            | ModHostError::Load { module, .. }
            | ModHostError::Call { module, .. } => OutputSource::Module(module.clone()),
            ModHostError::Exec { scope, .. } => scope.clone(),
            ModHostError::Expose { target, .. } => OutputSource::Module(target.clone()),
            ModHostError::Engine(_) | ModHostError::Io(_) | ModHostError::Config(_) => {
                OutputSource::System
            }
        }
    }
}

/// Result type alias for modhost operations.
pub type Result<T> = std::result::Result<T, ModHostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_module_display() {
        let err = ModHostError::DuplicateModule("alpha".to_string());
        assert_eq!(err.to_string(), "module 'alpha' is already loaded");
    }

    #[test]
    fn test_function_not_found_display() {
        let err = ModHostError::FunctionNotFound {
            module: "alpha".to_string(),
            function: "tick".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "function 'tick' not found in module 'alpha'"
        );
    }

    #[test]
    fn test_exec_display_uses_scope() {
        let err = ModHostError::Exec {
            scope: OutputSource::Shared,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "script execution failed in shared: boom");
    }

    #[test]
    fn test_output_source_tagging() {
        let err = ModHostError::ModuleNotFound("ghost".to_string());
        assert_eq!(err.output_source(), OutputSource::Module("ghost".to_string()));

        let err = ModHostError::Expose {
            target: "a".to_string(),
            source_module: "b".to_string(),
            message: "x".to_string(),
        };
        assert_eq!(err.output_source(), OutputSource::Module("a".to_string()));

        let err = ModHostError::Config("bad".to_string());
        assert_eq!(err.output_source(), OutputSource::System);
    }

    #[test]
    fn test_lua_error_conversion() {
        let err: ModHostError = mlua::Error::RuntimeError("oops".to_string()).into();
        assert!(matches!(err, ModHostError::Engine(_)));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ModHostError = io_err.into();
        assert!(matches!(err, ModHostError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
