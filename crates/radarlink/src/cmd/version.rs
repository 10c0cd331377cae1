use radarlink_frame::{DEFAULT_MAX_PAYLOAD, MAGIC_WORD};
use radarlink_pipeline::DEFAULT_HANDOFF_CAPACITY;
use radarlink_transport::serial::{DEFAULT_CLI_BAUD, DEFAULT_DATA_BAUD};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("radarlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: radarlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("RADARLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("magic_word: {MAGIC_WORD:02x?}");
    println!("default_data_baud: {DEFAULT_DATA_BAUD}");
    println!("default_cli_baud: {DEFAULT_CLI_BAUD}");
    println!("default_max_payload: {DEFAULT_MAX_PAYLOAD}");
    println!("default_handoff_capacity: {DEFAULT_HANDOFF_CAPACITY}");

    Ok(SUCCESS)
}
