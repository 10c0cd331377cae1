//! Device byte source abstraction for radar sensor modules.
//!
//! A sensor module exposes two serial endpoints: a high-rate data stream
//! carrying framed measurements and a low-rate command stream accepting text
//! configuration lines. Both are surfaced as a [`DeviceStream`], opened through
//! a [`PortOpener`] so the layers above never touch a concrete driver.
//!
//! This is the lowest layer of radarlink. Everything else builds on top of
//! the [`DeviceStream`] type provided here.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{available_ports, PortInfo, PortSettings, SerialOpener};
pub use traits::{DeviceIo, DeviceStream, PortOpener};
