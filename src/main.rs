use std::io;
use std::process::ExitCode;

use tracing::{error, info, warn};

use modhost::{cli, Config, ConsoleSink, ModuleHost, ScriptDirectory};

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = modhost::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        modhost::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let sink = ConsoleSink::new(config.output.timezone.clone(), config.output_time_format());
    let mut host = match ModuleHost::new(&config, sink) {
        Ok(host) => host,
        Err(e) => {
            error!("Failed to start module host: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let scripts = ScriptDirectory::from_config(&config.scripts);
    info!("Scripts directory: {}", scripts.dir().display());

    for name in &config.scripts.autoload {
        match scripts.source_for(name) {
            // Failures are already reported through the output sink
            Some(source) => {
                let _ = host.load(name, source);
            }
            None => warn!("Autoload script not found: {}", name),
        }
    }
    host.flush_output();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = cli::run_shell(&mut host, &scripts, stdin.lock(), &mut stdout) {
        error!("Shell terminated: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutting down");
    ExitCode::SUCCESS
}
