//! Configuration module for modhost.

use serde::Deserialize;
use std::path::Path;

use crate::datetime::{is_valid_format, is_valid_timezone};
use crate::runtime::library_flags;
use crate::{ModHostError, Result};

/// Script discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsConfig {
    /// Directory scanned for module files.
    #[serde(default = "default_scripts_dir")]
    pub dir: String,
    /// File extensions treated as modules (case-insensitive, without dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Module files loaded at startup, by file name.
    #[serde(default)]
    pub autoload: Vec<String>,
}

fn default_scripts_dir() -> String {
    "lua".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["lua".to_string(), "ljbc".to_string()]
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            extensions: default_extensions(),
            autoload: Vec::new(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Standard libraries opened in the engine (the base library is always present).
    #[serde(default = "default_libraries")]
    pub libraries: Vec<String>,
}

fn default_libraries() -> Vec<String> {
    ["coroutine", "table", "string", "utf8", "math", "os", "package"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            libraries: default_libraries(),
        }
    }
}

/// Script output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Timestamp prefix format for output lines.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Format returned by the scripts' `current_time()`.
    #[serde(default = "default_clock_format")]
    pub clock_format: String,
    /// Timezone for timestamps (e.g., "Asia/Tokyo"). Empty means local time.
    #[serde(default)]
    pub timezone: String,
    /// Whether output lines carry a timestamp prefix.
    #[serde(default = "default_show_timestamps")]
    pub show_timestamps: bool,
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_clock_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_show_timestamps() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
            clock_format: default_clock_format(),
            timezone: String::new(),
            show_timestamps: default_show_timestamps(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty means console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Script discovery configuration.
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ModHostError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ModHostError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MODHOST_SCRIPTS_DIR`: Override the scripts directory
    /// - `MODHOST_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MODHOST_SCRIPTS_DIR") {
            if !dir.is_empty() {
                self.scripts.dir = dir;
            }
        }
        if let Ok(level) = std::env::var("MODHOST_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - an engine library name is unknown
    /// - the output timezone is not a known IANA name
    /// - no script extension is configured
    /// - an output time format contains a specifier chrono rejects
    pub fn validate(&self) -> Result<()> {
        library_flags(&self.engine.libraries)?;
        for (key, format) in [
            ("output.time_format", &self.output.time_format),
            ("output.clock_format", &self.output.clock_format),
        ] {
            if !is_valid_format(format) {
                return Err(ModHostError::Config(format!("invalid {} '{}'", key, format)));
            }
        }
        if !is_valid_timezone(&self.output.timezone) {
            return Err(ModHostError::Config(format!(
                "unknown timezone '{}'",
                self.output.timezone
            )));
        }
        if self.scripts.extensions.is_empty() {
            return Err(ModHostError::Config(
                "scripts.extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Timestamp format for output lines, if timestamps are enabled.
    pub fn output_time_format(&self) -> Option<String> {
        self.output
            .show_timestamps
            .then(|| self.output.time_format.clone())
    }
}
