//! Line-oriented command shell over a [`ModuleHost`].

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::host::ModuleHost;
use crate::registry::ScriptSource;
use crate::source::ScriptDirectory;

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Load a module; without a path it resolves inside the scripts directory.
    Load { name: String, path: Option<String> },
    Unload(String),
    UnloadAll,
    Reload(String),
    ReloadAll,
    Call {
        module: String,
        function: String,
        args: Vec<serde_json::Value>,
    },
    Exec { module: String, code: String },
    Shared(String),
    Expose {
        target: String,
        source: String,
        alias: String,
    },
    List,
    Scan,
    Help,
    Quit,
}

/// Shell input that could not be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
commands:
  load <file> [path]              load a module (path defaults to the scripts directory)
  unload <name>                   unload a module
  unload-all                      unload every module
  reload <name>                   reload a module from its source
  reload-all                      reload every module
  call <module> <fn> [json...]    call a module function
  exec <module> <code>            run code inside a module
  shared <code>                   run code inside the shared environment
  expose <target> <source> <alias>
                                  make <source> visible as <alias> inside <target>
  list                            list loaded modules
  scan                            list module files in the scripts directory
  help                            show this help
  quit                            exit";

/// Split off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(pos) => (&input[..pos], input[pos..].trim_start()),
        None => (input, ""),
    }
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = split_word(line);
    let words: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb {
        "load" => match words.as_slice() {
            [name] => Command::Load {
                name: name.to_string(),
                path: None,
            },
            [name, path] => Command::Load {
                name: name.to_string(),
                path: Some(path.to_string()),
            },
            _ => return Err(CommandError::Usage("load <file> [path]")),
        },
        "unload" => match words.as_slice() {
            [name] => Command::Unload(name.to_string()),
            _ => return Err(CommandError::Usage("unload <name>")),
        },
        "unload-all" => Command::UnloadAll,
        "reload" => match words.as_slice() {
            [name] => Command::Reload(name.to_string()),
            _ => return Err(CommandError::Usage("reload <name>")),
        },
        "reload-all" => Command::ReloadAll,
        "call" => match words.as_slice() {
            [module, function, args @ ..] => Command::Call {
                module: module.to_string(),
                function: function.to_string(),
                args: args.iter().map(|arg| parse_argument(arg)).collect(),
            },
            _ => return Err(CommandError::Usage("call <module> <fn> [json...]")),
        },
        "exec" => {
            let (module, code) = split_word(rest);
            if module.is_empty() || code.is_empty() {
                return Err(CommandError::Usage("exec <module> <code>"));
            }
            Command::Exec {
                module: module.to_string(),
                code: code.to_string(),
            }
        }
        "shared" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("shared <code>"));
            }
            Command::Shared(rest.to_string())
        }
        "expose" => match words.as_slice() {
            [target, source, alias] => Command::Expose {
                target: target.to_string(),
                source: source.to_string(),
                alias: alias.to_string(),
            },
            _ => return Err(CommandError::Usage("expose <target> <source> <alias>")),
        },
        "list" => Command::List,
        "scan" => Command::Scan,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

/// Arguments are JSON; anything that is not valid JSON is passed as a string.
fn parse_argument(arg: &str) -> serde_json::Value {
    serde_json::from_str(arg).unwrap_or_else(|_| serde_json::Value::String(arg.to_string()))
}

/// Whether the shell should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run a command against the host, writing command results to `out`.
///
/// Failures are already reported through the host's output sink, so they
/// are not written again here.
pub fn execute<W: Write>(
    host: &mut ModuleHost,
    scripts: &ScriptDirectory,
    command: Command,
    out: &mut W,
) -> io::Result<Flow> {
    match command {
        Command::Load { name, path } => {
            let source = match path {
                Some(path) => ScriptSource::file(path),
                None => ScriptSource::File(scripts.path_of(&name)),
            };
            if host.load(&name, source).is_ok() {
                writeln!(out, "loaded {}", name)?;
            }
        }
        Command::Unload(name) => {
            let _ = host.unload(&name);
        }
        Command::UnloadAll => {
            let _ = host.unload_all();
        }
        Command::Reload(name) => {
            if host.reload(&name).is_ok() {
                writeln!(out, "reloaded {}", name)?;
            }
        }
        Command::ReloadAll => {
            for (name, result) in host.reload_all() {
                let status = if result.is_ok() { "ok" } else { "failed" };
                writeln!(out, "{}: {}", name, status)?;
            }
        }
        Command::Call {
            module,
            function,
            args,
        } => {
            if let Ok(values) = host.call_function_json(&module, &function, &args) {
                host.flush_output();
                writeln!(out, "=> {}", host.display(&values))?;
            }
        }
        Command::Exec { module, code } => {
            let _ = host.execute_in_module(&module, &code);
        }
        Command::Shared(code) => {
            let _ = host.execute_shared(&code);
        }
        Command::Expose {
            target,
            source,
            alias,
        } => {
            let _ = host.expose(&target, &source, &alias);
        }
        Command::List => {
            let mut names = host.list_modules();
            names.sort();
            if names.is_empty() {
                writeln!(out, "no modules loaded")?;
            }
            for name in names {
                writeln!(out, "{}", name)?;
            }
        }
        Command::Scan => match scripts.scan() {
            Ok(files) => {
                for file in files {
                    let state = if host.is_loaded(&file.name) {
                        "loaded"
                    } else {
                        "not loaded"
                    };
                    writeln!(out, "{}\t{}", file.name, state)?;
                }
            }
            Err(e) => writeln!(out, "scan failed: {}", e)?,
        },
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => return Ok(Flow::Quit),
    }

    host.flush_output();
    Ok(Flow::Continue)
}

/// Read commands from `input` until end of input or `quit`.
pub fn run_shell<R: BufRead, W: Write>(
    host: &mut ModuleHost,
    scripts: &ScriptDirectory,
    input: R,
    out: &mut W,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        match parse_command(&line) {
            Ok(Some(command)) => {
                if execute(host, scripts, command, out)? == Flow::Quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(out, "{}", e)?,
        }
        out.flush()?;
    }
    Ok(())
}
