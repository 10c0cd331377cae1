/// Errors that can occur in device transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named device.
    #[error("failed to open {port} at {baud_rate} baud: {source}")]
    Open {
        port: String,
        baud_rate: u32,
        source: std::io::Error,
    },

    /// No device name was configured.
    #[error("no device configured for {0} port")]
    Unconfigured(&'static str),

    /// Failed to enumerate devices on the host.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// An I/O error occurred on the device stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
