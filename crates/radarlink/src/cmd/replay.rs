use std::fs::File;
use std::io::BufReader;
use std::time::{Duration, Instant};

use radarlink_frame::{decode_frame_at, FrameError, FrameSynchronizer, SyncConfig};
use radarlink_pipeline::TrackPairer;
use serde::Serialize;
use tracing::info;

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_event, print_summary, OutputFormat};

/// Sensor CPU clock driving the header `time` field.
const SENSOR_CLOCK_HZ: u64 = 200_000_000;

/// Rebuilds arrival instants from header cycle counts.
///
/// Cycle counts wrap at `u32::MAX`; each step is taken from the previous
/// frame, so a single wrap between two frames is handled.
struct SensorClock {
    last: Option<(u32, Instant)>,
}

impl SensorClock {
    fn new() -> Self {
        Self { last: None }
    }

    fn arrival(&mut self, cycles: u32) -> Instant {
        let arrival = match self.last {
            Some((previous, at)) => {
                let elapsed = u64::from(cycles.wrapping_sub(previous));
                at + Duration::from_nanos(elapsed * 1_000_000_000 / SENSOR_CLOCK_HZ)
            }
            None => Instant::now(),
        };
        self.last = Some((cycles, arrival));
        arrival
    }
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
    capture: String,
    bytes_scanned: u64,
    frames: u64,
    rejected: u64,
    emitted: u64,
    discarded: u64,
    decode_failures: u64,
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::open(&args.capture).map_err(|err| {
        io_error(&format!("failed to open {}", args.capture.display()), err)
    })?;

    let mut config = SyncConfig::default();
    if let Some(max) = args.max_payload {
        config.max_payload_len = max;
    }
    let mut sync = FrameSynchronizer::with_config(BufReader::new(file), config);
    let mut pairer = TrackPairer::new();
    let mut clock = SensorClock::new();
    let name = args
        .capture
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());

    let mut printed = 0usize;
    loop {
        let raw = match sync.read_frame() {
            Ok(raw) => raw,
            // End of capture, including a truncated final frame.
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("replay failed", err)),
        };

        let arrival = clock.arrival(raw.header.time);
        let Some(event) = pairer.accept(decode_frame_at(&raw.payload, &raw.header, arrival)) else {
            continue;
        };
        if !args.summary {
            print_event(&event, &name, format);
        }
        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    let stats = sync.stats();
    let pairing = pairer.stats();
    let summary = ReplaySummary {
        capture: args.capture.display().to_string(),
        bytes_scanned: stats.bytes_scanned,
        frames: stats.frames,
        rejected: stats.rejected,
        emitted: pairing.emitted,
        discarded: pairing.discarded,
        decode_failures: pairing.decode_failures,
    };

    if args.summary {
        print_summary("replay", &summary, format);
    } else {
        info!(
            frames = summary.frames,
            rejected = summary.rejected,
            emitted = summary.emitted,
            discarded = summary.discarded,
            "replay finished"
        );
    }
    Ok(SUCCESS)
}
