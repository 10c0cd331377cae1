/// Errors raised while decoding a frame header or its TLV records.
///
/// Any of these rejects the whole frame; no partial results are returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer than 32 header bytes were supplied.
    #[error("malformed frame header ({len} bytes, need {expected})")]
    MalformedHeader { len: usize, expected: usize },

    /// A TLV carried a type code outside the five defined record kinds.
    #[error("unknown TLV type {0}")]
    UnknownTlv(u32),

    /// A record or TLV header ran past the end of the payload.
    #[error("truncated {what} ({needed} bytes needed, {available} available)")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// A TLV header declared a negative payload length.
    #[error("invalid TLV length {0}")]
    InvalidLength(i32),
}

/// Errors raised by the byte-stream synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading the device.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device returned zero bytes (closed or removed).
    #[error("connection closed (zero-byte read)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
