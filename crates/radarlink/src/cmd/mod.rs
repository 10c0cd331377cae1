use clap::{Args, Subcommand};
use std::path::PathBuf;

use radarlink_pipeline::ModuleConfig;

use crate::exit::{pipeline_error, CliResult};
use crate::output::OutputFormat;

pub mod console;
pub mod ports;
pub mod replay;
pub mod run;
pub mod synth;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a sensor module, configure it, and print paired frames.
    Run(RunArgs),
    /// Drive a sensor module interactively from stdin.
    Console(ConsoleArgs),
    /// Decode and pair frames from a recorded byte capture.
    Replay(ReplayArgs),
    /// Write a synthetic capture for testing without hardware.
    Synth(SynthArgs),
    /// List serial ports visible to the host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Console(args) => console::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Synth(args) => synth::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Module settings shared by commands that open hardware.
///
/// Values come from `--settings` first; explicit flags and environment
/// variables override them.
#[derive(Args, Debug, Default)]
pub struct ModuleArgs {
    /// JSON settings file with module defaults.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
    /// Data stream device (e.g. /dev/ttyUSB1, COM4).
    #[arg(long, env = "RADARLINK_DATA_PORT")]
    pub data_port: Option<String>,
    /// Command stream device (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, env = "RADARLINK_CLI_PORT")]
    pub cli_port: Option<String>,
    /// Data stream baud rate.
    #[arg(long, env = "RADARLINK_DATA_BAUD")]
    pub data_baud: Option<u32>,
    /// Command stream baud rate.
    #[arg(long, env = "RADARLINK_CLI_BAUD")]
    pub cli_baud: Option<u32>,
    /// Name reported with each frame.
    #[arg(long)]
    pub identifier: Option<String>,
    /// Raw frames buffered between reader and decoder.
    #[arg(long)]
    pub handoff_capacity: Option<usize>,
    /// Largest accepted TLV payload in bytes.
    #[arg(long)]
    pub max_payload: Option<usize>,
}

impl ModuleArgs {
    pub fn load(&self) -> CliResult<ModuleConfig> {
        let mut config = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    pipeline_error(
                        "settings",
                        radarlink_pipeline::PipelineError::ReadFile {
                            path: path.clone(),
                            source,
                        },
                    )
                })?;
                ModuleConfig::from_json(&text).map_err(|err| pipeline_error("settings", err))?
            }
            None => ModuleConfig::default(),
        };

        if let Some(port) = &self.data_port {
            config.data_port = port.clone();
        }
        if let Some(port) = &self.cli_port {
            config.cli_port = port.clone();
        }
        if let Some(baud) = self.data_baud {
            config.data_baud = baud;
        }
        if let Some(baud) = self.cli_baud {
            config.cli_baud = baud;
        }
        if let Some(identifier) = &self.identifier {
            config.identifier = identifier.clone();
        }
        if let Some(capacity) = self.handoff_capacity {
            config.handoff_capacity = capacity;
        }
        if let Some(max) = self.max_payload {
            config.max_payload_len = max;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub module: ModuleArgs,
    /// Configuration script (.cfg) sent to the command port before running.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub module: ModuleArgs,
    /// Configuration script used by `config` when no path is given.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Raw byte capture of a data port.
    pub capture: PathBuf,
    /// Stop after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest accepted TLV payload in bytes.
    #[arg(long)]
    pub max_payload: Option<usize>,
    /// Print only the final counters.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Output capture path.
    pub out: PathBuf,
    /// Frames to generate.
    #[arg(long, default_value_t = 20)]
    pub frames: u32,
    /// Targets walking through the scene.
    #[arg(long, default_value_t = 3)]
    pub targets: u32,
    /// Points reflected by each target per frame.
    #[arg(long, default_value_t = 4)]
    pub points_per_target: u32,
    /// Random seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Bytes of line noise inserted between frames.
    #[arg(long, default_value_t = 0)]
    pub noise: usize,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
