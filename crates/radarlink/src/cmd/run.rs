use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use radarlink_pipeline::{ModuleEvent, ModuleIo};
use radarlink_transport::SerialOpener;
use tracing::{debug, info};

use crate::cmd::RunArgs;
use crate::exit::{pipeline_error, CliError, CliResult, CONNECTION_LOST, SUCCESS};
use crate::output::{print_event, OutputFormat};

const EVENT_POLL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.module.load()?;
    let identifier = config.identifier.clone();
    let (module, events) = ModuleIo::new(config, Arc::new(SerialOpener));

    module
        .initialize_ports()
        .map_err(|err| pipeline_error("port initialization failed", err))?;

    if let Some(path) = &args.config {
        let lines = module
            .write_config_file(path)
            .map_err(|err| pipeline_error("configuration failed", err))?;
        info!(lines, path = %path.display(), "sensor configured");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    module
        .run()
        .map_err(|err| pipeline_error("run failed", err))?;

    let mut printed = 0usize;
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(SUCCESS);
        }

        match events.recv_timeout(EVENT_POLL) {
            Ok(ModuleEvent::Frame(event)) => {
                print_event(&event, &identifier, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break Ok(SUCCESS);
                }
            }
            Ok(ModuleEvent::ConnectionLost { reason }) => {
                break Err(CliError::new(
                    CONNECTION_LOST,
                    format!("connection lost: {reason}"),
                ));
            }
            Ok(ModuleEvent::StateChanged(state)) => debug!(%state, "module state"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(SUCCESS),
        }
    };

    let dropped = module.dropped_frames();
    module.stop();
    info!(printed, dropped, "stopped");
    result
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
