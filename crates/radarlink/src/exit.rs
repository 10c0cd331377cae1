use std::fmt;
use std::io;

use radarlink_frame::FrameError;
use radarlink_pipeline::PipelineError;
use radarlink_transport::TransportError;

// Exit code constants aligned with sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const CONNECTION_LOST: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 66;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. } => {
            let code = match source.kind() {
                io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
                io::ErrorKind::NotFound => NOT_FOUND,
                _ => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        TransportError::Unconfigured(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(CONNECTION_LOST, format!("{context}: {err}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::PortNotOpen(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PipelineError::Command(source) => io_error(context, source),
        PipelineError::ReadFile { ref source, .. } => {
            let code = match source.kind() {
                io::ErrorKind::NotFound => NOT_FOUND,
                io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
                _ => INTERNAL,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        PipelineError::Settings(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_maps_to_not_found() {
        let err = transport_error(
            "open failed",
            TransportError::Open {
                port: "/dev/ttyACM9".to_string(),
                baud_rate: 921_600,
                source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
            },
        );
        assert_eq!(err.code, NOT_FOUND);
        assert!(err.message.starts_with("open failed: "));
    }

    #[test]
    fn unconfigured_port_is_usage_error() {
        let err = pipeline_error(
            "init",
            PipelineError::Transport(TransportError::Unconfigured("data")),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn closed_stream_is_connection_lost() {
        assert_eq!(
            frame_error("read", FrameError::ConnectionClosed).code,
            CONNECTION_LOST
        );
    }
}
