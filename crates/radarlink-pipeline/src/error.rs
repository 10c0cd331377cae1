use std::path::PathBuf;

/// Errors that can occur in pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error (opening or cloning a device).
    #[error("transport error: {0}")]
    Transport(#[from] radarlink_transport::TransportError),

    /// Frame-level error on the data stream.
    #[error("frame error: {0}")]
    Frame(#[from] radarlink_frame::FrameError),

    /// The operation needs a port that is not open.
    #[error("{0} port is not open")]
    PortNotOpen(&'static str),

    /// Writing configuration lines to the command port failed.
    #[error("command write failed: {0}")]
    Command(#[source] std::io::Error),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings JSON could not be parsed.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// A background thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
