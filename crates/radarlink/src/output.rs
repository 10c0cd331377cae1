use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use radarlink_frame::UNKNOWN_TID;
use radarlink_pipeline::PairedEvent;
use radarlink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PointOutput {
    x: f64,
    y: f64,
    z: f64,
    doppler: f64,
    snr: f64,
    tid: Option<u32>,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    module: &'a str,
    frame_number: u32,
    delta_ms: f64,
    presence: bool,
    targets: Vec<u32>,
    tracks: Vec<u32>,
    points: Vec<PointOutput>,
    timestamp: String,
}

impl<'a> EventOutput<'a> {
    fn new(event: &PairedEvent, module: &'a str) -> Self {
        let frame = &event.frame;
        let tid = |tid: u32| (tid != UNKNOWN_TID).then_some(tid);
        Self {
            module,
            frame_number: frame.header.frame_number,
            delta_ms: event.delta.as_secs_f64() * 1000.0,
            presence: frame.presence,
            targets: frame.targets.iter().map(|t| t.tid).collect(),
            tracks: frame
                .points
                .iter()
                .filter_map(|p| tid(p.tid))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            points: frame
                .points
                .iter()
                .map(|p| PointOutput {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    doppler: p.doppler,
                    snr: p.snr,
                    tid: tid(p.tid),
                })
                .collect(),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_event(event: &PairedEvent, module: &str, format: OutputFormat) {
    let out = EventOutput::new(event, module);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "DELTA (ms)", "POINTS", "TARGETS", "TRACKS", "PRESENCE"])
                .add_row(vec![
                    out.frame_number.to_string(),
                    format!("{:.1}", out.delta_ms),
                    out.points.len().to_string(),
                    join(&out.targets),
                    join(&out.tracks),
                    out.presence.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} delta={:.1}ms points={} targets=[{}] tracks=[{}] presence={}",
                out.frame_number,
                out.delta_ms,
                out.points.len(),
                join(&out.targets),
                join(&out.tracks),
                out.presence
            );
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    port_name: &'a str,
    kind: &'a str,
    product: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports
        .iter()
        .map(|p| PortOutput {
            port_name: &p.port_name,
            kind: p.kind,
            product: p.product.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "PRODUCT"]);
            for row in &rows {
                table.add_row(vec![
                    row.port_name,
                    row.kind,
                    row.product.unwrap_or("-"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if rows.is_empty() {
                println!("no serial ports found");
            }
            for row in &rows {
                println!(
                    "{} ({}) {}",
                    row.port_name,
                    row.kind,
                    row.product.unwrap_or("")
                );
            }
        }
    }
}

/// Print a flat key/value record, one object per line in JSON mode.
pub fn print_summary<T: Serialize>(title: &str, record: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table | OutputFormat::Pretty => {
            let value = serde_json::to_value(record).unwrap_or_default();
            let Some(fields) = value.as_object() else {
                return;
            };
            if matches!(format, OutputFormat::Table) {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec![title.to_uppercase(), String::new()]);
                for (key, value) in fields {
                    table.add_row(vec![key.clone(), plain(value)]);
                }
                println!("{table}");
            } else {
                let line: Vec<String> = fields
                    .iter()
                    .map(|(key, value)| format!("{key}={}", plain(value)))
                    .collect();
                println!("{title}: {}", line.join(" "));
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
