use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use radarlink_pipeline::{ModuleEvent, ModuleIo};
use radarlink_transport::SerialOpener;

use crate::cmd::ConsoleArgs;
use crate::exit::{io_error, pipeline_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

const HELP: &str = "\
commands:
  init            open the data and command ports
  config [FILE]   send a .cfg script to the command port
  run             start or resume reading frames
  pause           stop reading, keep ports open
  stop            close both ports
  status          print the port state
  help            show this text
  exit            stop and quit";

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Init,
    Config(Option<PathBuf>),
    Run,
    Pause,
    Stop,
    Status,
    Help,
    Exit,
}

impl ConsoleCommand {
    /// Parse one input line; `None` for blank input.
    fn parse(line: &str) -> Option<Result<Self, String>> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let arg = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("init", None) => Self::Init,
            ("config", path) => Self::Config(path.map(PathBuf::from)),
            ("run", None) => Self::Run,
            ("pause", None) => Self::Pause,
            ("stop", None) => Self::Stop,
            ("status", None) => Self::Status,
            ("help" | "?", _) => Self::Help,
            ("exit" | "quit", None) => Self::Exit,
            (_, Some(_)) if is_known(verb) => {
                return Some(Err(format!("{verb} takes no arguments")))
            }
            _ => return Some(Err(format!("unknown command: {verb} (try `help`)"))),
        };
        Some(Ok(command))
    }
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb.to_ascii_lowercase().as_str(),
        "init" | "run" | "pause" | "stop" | "status" | "exit" | "quit"
    )
}

pub fn run(args: ConsoleArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.module.load()?;
    let identifier = config.identifier.clone();
    let (module, events) = ModuleIo::new(config, Arc::new(SerialOpener));

    thread::Builder::new()
        .name("radarlink-console-events".to_string())
        .spawn(move || {
            for event in events {
                match event {
                    ModuleEvent::Frame(event) => print_event(&event, &identifier, format),
                    ModuleEvent::ConnectionLost { reason } => {
                        eprintln!("connection lost: {reason}")
                    }
                    ModuleEvent::StateChanged(state) => eprintln!("state: {state}"),
                }
            }
        })
        .map_err(|err| io_error("event printer", err))?;

    eprintln!("{HELP}");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("stdin", err))?;
        let command = match ConsoleCommand::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(message)) => {
                eprintln!("{message}");
                continue;
            }
        };

        if command == ConsoleCommand::Exit {
            break;
        }
        if let Err(err) = execute(&module, command, args.config.as_ref()) {
            eprintln!("error: {err}");
        }
        let _ = std::io::stderr().flush();
    }

    module.stop();
    Ok(SUCCESS)
}

fn execute(module: &ModuleIo, command: ConsoleCommand, default_cfg: Option<&PathBuf>) -> CliResult<()> {
    match command {
        ConsoleCommand::Init => {
            module
                .initialize_ports()
                .map_err(|err| pipeline_error("init", err))?;
        }
        ConsoleCommand::Config(path) => {
            let path = path
                .or_else(|| default_cfg.cloned())
                .ok_or_else(|| CliError::new(USAGE, "config: no file given and no --config set"))?;
            let lines = module
                .write_config_file(&path)
                .map_err(|err| pipeline_error("config", err))?;
            eprintln!("sent {lines} lines from {}", path.display());
        }
        ConsoleCommand::Run => {
            module.run().map_err(|err| pipeline_error("run", err))?;
        }
        ConsoleCommand::Pause => {
            module.pause();
        }
        ConsoleCommand::Stop => module.stop(),
        ConsoleCommand::Status => {
            eprintln!(
                "{}: {} (dropped frames: {})",
                module.config().identifier,
                module.status(),
                module.dropped_frames()
            );
        }
        ConsoleCommand::Help => eprintln!("{HELP}"),
        ConsoleCommand::Exit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lifecycle_verbs() {
        assert_eq!(ConsoleCommand::parse("init"), Some(Ok(ConsoleCommand::Init)));
        assert_eq!(ConsoleCommand::parse("  RUN "), Some(Ok(ConsoleCommand::Run)));
        assert_eq!(ConsoleCommand::parse("quit"), Some(Ok(ConsoleCommand::Exit)));
        assert_eq!(ConsoleCommand::parse(""), None);
    }

    #[test]
    fn config_takes_optional_path() {
        assert_eq!(
            ConsoleCommand::parse("config"),
            Some(Ok(ConsoleCommand::Config(None)))
        );
        assert_eq!(
            ConsoleCommand::parse("config profiles/people.cfg"),
            Some(Ok(ConsoleCommand::Config(Some(PathBuf::from(
                "profiles/people.cfg"
            )))))
        );
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(matches!(ConsoleCommand::parse("launch"), Some(Err(_))));
        let err = ConsoleCommand::parse("stop now").unwrap().unwrap_err();
        assert!(err.contains("takes no arguments"));
    }
}
