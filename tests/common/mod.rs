//! Test helpers for module host integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use modhost::{Config, MemorySink, ModuleHost, OutputEvent, OutputSource, Severity};

/// A host wired to a memory sink, with a scratch directory for script files.
pub struct TestHost {
    pub host: ModuleHost,
    pub sink: MemorySink,
    pub dir: TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let sink = MemorySink::new();
        let host = ModuleHost::new(config, sink.clone()).expect("failed to create module host");
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        Self { host, sink, dir }
    }

    /// Write a script file into the scratch directory and return its path.
    pub fn write_script(&self, file_name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, text).expect("failed to write script");
        path
    }

    /// All events delivered so far.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.host.flush_output();
        self.sink.snapshot()
    }

    /// Delivered events, then clear the sink.
    pub fn take_events(&self) -> Vec<OutputEvent> {
        let events = self.events();
        self.sink.clear();
        events
    }

    /// Evaluate an expression inside a module by calling a probe function.
    pub fn eval_in(&mut self, module: &str, expr: &str) -> String {
        self.host
            .execute_in_module(module, &format!("function __probe() return {} end", expr))
            .expect("failed to install probe");
        let values = self
            .host
            .call_function(module, "__probe", ())
            .expect("probe call failed");
        self.host.display(&values)
    }
}

/// Texts of `events` in delivery order.
pub fn texts(events: &[OutputEvent]) -> Vec<String> {
    events.iter().map(|e| e.text.clone()).collect()
}

/// Events with error severity.
pub fn errors(events: &[OutputEvent]) -> Vec<&OutputEvent> {
    events
        .iter()
        .filter(|e| e.severity == Severity::Error)
        .collect()
}

pub fn module(name: &str) -> OutputSource {
    OutputSource::Module(name.to_string())
}
