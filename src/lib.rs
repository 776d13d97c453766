//! modhost - Lua module host
//!
//! Loads Lua modules into isolated environments that share one common
//! layer, routes their output through a single ordered sink, and lets
//! modules see each other only through explicit exposure.

pub mod cli;
pub mod config;
pub mod datetime;
pub mod env;
pub mod error;
pub mod expose;
pub mod gateway;
pub mod host;
pub mod logging;
pub mod output;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod value;

pub use config::Config;
pub use env::{EnvLevel, Environment};
pub use error::{ModHostError, Result};
pub use gateway::ExecutionGateway;
pub use host::ModuleHost;
pub use output::{
    ConsoleSink, MemorySink, OutputEvent, OutputHandle, OutputRouter, OutputSink, OutputSource,
    Severity,
};
pub use registry::{Module, ModuleRegistry, ScriptSource};
pub use runtime::RuntimeHost;
pub use source::{ScriptDirectory, ScriptFile};
