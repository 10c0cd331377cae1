mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "radarlink", version, about = "Radar sensor module CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "radarlink",
            "run",
            "--data-port",
            "/dev/ttyUSB1",
            "--cli-port",
            "/dev/ttyUSB0",
            "--config",
            "people.cfg",
            "--count",
            "10",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.module.data_port.as_deref(), Some("/dev/ttyUSB1"));
                assert_eq!(args.count, Some(10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn replay_requires_capture() {
        let err = Cli::try_parse_from(["radarlink", "replay"]).expect_err("capture is required");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_synth_subcommand() {
        let cli = Cli::try_parse_from([
            "radarlink",
            "--format",
            "json",
            "synth",
            "/tmp/capture.bin",
            "--frames",
            "5",
            "--seed",
            "7",
        ])
        .expect("synth args should parse");
        assert!(matches!(cli.command, Command::Synth(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
