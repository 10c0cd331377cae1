use std::fs::File;
use std::io::{BufWriter, Write};

use rand::{rngs::StdRng, Rng, SeedableRng};
use radarlink_frame::{FrameBuilder, FrameHeader, PointIndex, PointUnits, Target, TlvRecord};
use serde::Serialize;

use crate::cmd::SynthArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{print_summary, OutputFormat};

/// Frame period of the simulated sensor, seconds.
const FRAME_PERIOD: f32 = 0.05;
const PLATFORM: u32 = 0x000A_6843;
const VERSION: u32 = 0x0306_0000;
/// Sensor CPU cycles per frame at 200 MHz.
const CYCLES_PER_FRAME: u32 = 10_000_000;

const UNITS: PointUnits = PointUnits {
    elevation: 0.01,
    azimuth: 0.01,
    doppler: 0.05,
    range: 0.025,
    snr: 0.04,
};

/// A target walking inside the sensor's field of view.
struct Walker {
    tid: u32,
    position: [f32; 3],
    velocity: [f32; 3],
}

impl Walker {
    fn spawn(tid: u32, rng: &mut StdRng) -> Self {
        Self {
            tid,
            position: [rng.gen_range(-2.0..2.0), rng.gen_range(1.0..5.0), 1.0],
            velocity: [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0],
        }
    }

    fn step(&mut self) {
        for axis in 0..2 {
            self.position[axis] += self.velocity[axis] * FRAME_PERIOD;
        }
        if !(-3.0..=3.0).contains(&self.position[0]) {
            self.velocity[0] = -self.velocity[0];
        }
        if !(0.5..=6.0).contains(&self.position[1]) {
            self.velocity[1] = -self.velocity[1];
        }
    }

    fn target(&self) -> Target {
        let mut error_covariance = [0.0; 16];
        for i in 0..4 {
            error_covariance[i * 5] = 0.05;
        }
        Target {
            tid: self.tid,
            position: self.position,
            velocity: self.velocity,
            acceleration: [0.0; 3],
            error_covariance,
            gating_gain: 3.0,
            confidence: 0.9,
        }
    }

    /// A reflection near the target, quantized the way the sensor sends it.
    fn reflection(&self, rng: &mut StdRng) -> PointIndex {
        let x = self.position[0] + rng.gen_range(-0.2f32..0.2);
        let y = self.position[1] + rng.gen_range(-0.2f32..0.2);
        let z = rng.gen_range(0.2f32..1.8);
        let range = (x * x + y * y + z * z).sqrt();
        let radial_speed = (self.velocity[0] * x + self.velocity[1] * y) / range;

        PointIndex {
            elevation: quantize(z / range, UNITS.elevation, |v| v.asin()) as i8,
            azimuth: quantize(x, UNITS.azimuth, |v| v.atan2(y)) as i8,
            doppler: (radial_speed / UNITS.doppler).round() as i16,
            range: (range / UNITS.range).round() as i16,
            snr: (rng.gen_range(8.0f32..30.0) / UNITS.snr).round() as i16,
        }
    }
}

fn quantize(value: f32, unit: f32, angle: impl Fn(f32) -> f32) -> f32 {
    (angle(value) / unit).round().clamp(-127.0, 127.0)
}

#[derive(Debug, Serialize)]
struct SynthSummary {
    path: String,
    frames: u32,
    targets: u32,
    bytes: u64,
}

pub fn run(args: SynthArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::create(&args.out)
        .map_err(|err| io_error(&format!("failed to create {}", args.out.display()), err))?;
    let mut out = BufWriter::new(file);
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut walkers: Vec<Walker> = (0..args.targets)
        .map(|tid| Walker::spawn(tid, &mut rng))
        .collect();
    let mut previous_tids: Option<Vec<u8>> = None;
    let mut bytes = 0u64;

    for frame_number in 0..args.frames {
        walkers.iter_mut().for_each(Walker::step);

        let mut points = Vec::new();
        let mut tids = Vec::new();
        for walker in &walkers {
            for _ in 0..args.points_per_target {
                points.push(walker.reflection(&mut rng));
                tids.push(walker.tid as u8);
            }
        }

        let mut builder = FrameBuilder::new(frame_number)
            .header(FrameHeader {
                version: VERSION,
                platform: PLATFORM,
                frame_number,
                time: frame_number.wrapping_mul(CYCLES_PER_FRAME),
                num_detected_objects: points.len() as u32,
                ..FrameHeader::default()
            })
            .point_cloud(UNITS, points)
            .record(TlvRecord::TargetList(
                walkers.iter().map(Walker::target).collect(),
            ));
        if let Some(ids) = previous_tids.replace(tids) {
            builder = builder.target_indices(&ids);
        }
        let frame = builder.presence(!walkers.is_empty()).to_bytes();

        let noise: Vec<u8> = (0..args.noise).map(|_| rng.gen()).collect();
        out.write_all(&noise)
            .and_then(|()| out.write_all(&frame))
            .map_err(|err| io_error("write failed", err))?;
        bytes += (noise.len() + frame.len()) as u64;
    }
    out.flush().map_err(|err| io_error("write failed", err))?;

    print_summary(
        "synth",
        &SynthSummary {
            path: args.out.display().to_string(),
            frames: args.frames,
            targets: args.targets,
            bytes,
        },
        format,
    );
    Ok(SUCCESS)
}
