//! Serial ingestion of radar sensor TLV frames.
//!
//! radarlink reads the framed binary stream a mmWave sensor module emits on
//! its data port, decodes each frame's TLV records, and pairs every point
//! cloud with the track ids the sensor reports one frame later.
//!
//! # Crate Structure
//!
//! - [`transport`] - Serial device access behind the `PortOpener` seam
//! - [`frame`] - Magic-word synchronization, TLV decoding and encoding
//! - [`pipeline`] - Port lifecycle, frame handoff and track pairing (behind `pipeline` feature)

/// Re-export transport types.
pub mod transport {
    pub use radarlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use radarlink_frame::*;
}

/// Re-export pipeline types (requires `pipeline` feature).
#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use radarlink_pipeline::*;
}
