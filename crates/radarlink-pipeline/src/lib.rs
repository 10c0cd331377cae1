//! Port lifecycle, frame handoff and track pairing for radar sensor modules.
//!
//! This is the "just works" layer. Create a [`ModuleIo`], initialize its
//! ports, optionally send a configuration script, and `run`: decoded frames
//! with confirmed track ids arrive as [`ModuleEvent::Frame`] on the returned
//! receiver.
//!
//! Internally a reading thread synchronizes the data stream into raw frames
//! and pushes them through a drop-oldest [`HandoffBuffer`]; a decode thread
//! drains it, decodes, and pairs each frame with the track ids reported one
//! frame later ([`TrackPairer`]).

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod handoff;
pub mod lifecycle;
pub mod pairing;
mod reader;
pub mod worker;

pub use command::{config_lines, send_config};
pub use config::ModuleConfig;
pub use error::{PipelineError, Result};
pub use event::{ModuleEvent, PortState};
pub use handoff::{HandoffBuffer, DEFAULT_HANDOFF_CAPACITY};
pub use lifecycle::ModuleIo;
pub use pairing::{PairedEvent, PairerStats, TrackPairer};
pub use worker::DecodeWorker;
