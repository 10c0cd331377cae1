use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{decode_header, FrameHeader, SyncConfig, HEADER_SIZE, MAGIC_WORD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;
const MAGIC_LEN: usize = MAGIC_WORD.len();

/// Sliding window over the last eight bytes seen, matched against the magic word.
#[derive(Debug, Clone, Default)]
pub struct MagicWordDetector {
    window: [u8; MAGIC_LEN],
    next: usize,
}

impl MagicWordDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; true when it completes a magic word.
    pub fn push(&mut self, byte: u8) -> bool {
        self.window[self.next] = byte;
        self.next = (self.next + 1) % MAGIC_LEN;

        (0..MAGIC_LEN).all(|i| self.window[(self.next + i) % MAGIC_LEN] == MAGIC_WORD[i])
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A frame cut from the stream but not yet decoded.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    /// The TLV payload following the header.
    pub payload: Bytes,
}

/// Counters kept by a [`FrameSynchronizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Bytes examined while hunting for a magic word.
    pub bytes_scanned: u64,
    /// Frames handed out.
    pub frames: u64,
    /// Frames discarded for an implausible length.
    pub rejected: u64,
}

/// Cuts raw frames out of any `Read` byte source.
///
/// Bytes are scanned one at a time for the magic word; once found, the header
/// and payload are read with exact-count reads. Callers always get complete
/// frames.
pub struct FrameSynchronizer<T> {
    inner: T,
    buf: BytesMut,
    detector: MagicWordDetector,
    config: SyncConfig,
    stats: SyncStats,
}

impl<T: Read> FrameSynchronizer<T> {
    /// Create a synchronizer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, SyncConfig::default())
    }

    /// Create a synchronizer with explicit configuration.
    pub fn with_config(inner: T, config: SyncConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            detector: MagicWordDetector::new(),
            config,
            stats: SyncStats::default(),
        }
    }

    /// Read until the next complete frame (blocking).
    ///
    /// Read timeouts while scanning are retried.
    pub fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            if let Some(frame) = self.poll_frame()? {
                return Ok(frame);
            }
        }
    }

    /// Scan for the next frame.
    ///
    /// Returns `Ok(None)` when the source timed out before a magic word was
    /// seen, so the caller can check for pause or cancellation. A timeout or
    /// zero-byte read once a frame has started is an error.
    pub fn poll_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            while self.buf.has_remaining() {
                let byte = self.buf.get_u8();
                self.stats.bytes_scanned += 1;

                if self.detector.push(byte) {
                    self.detector.reset();
                    if let Some(frame) = self.read_frame_body()? {
                        return Ok(Some(frame));
                    }
                }
            }

            if !self.fill(false)? {
                return Ok(None);
            }
        }
    }

    fn read_frame_body(&mut self) -> Result<Option<RawFrame>> {
        let header_bytes = self.read_exact(HEADER_SIZE)?;
        let header = match decode_header(&header_bytes) {
            Ok(header) => header,
            Err(err) => {
                debug!(error = %err, "discarding frame with malformed header");
                self.stats.rejected += 1;
                return Ok(None);
            }
        };

        let payload_len = header.payload_len();
        if payload_len <= 0 || payload_len as u64 > self.config.max_payload_len as u64 {
            debug!(
                frame_number = header.frame_number,
                payload_len,
                max = self.config.max_payload_len,
                "discarding frame with implausible length"
            );
            self.stats.rejected += 1;
            return Ok(None);
        }

        let payload = self.read_exact(payload_len as usize)?;
        self.stats.frames += 1;
        Ok(Some(RawFrame { header, payload }))
    }

    fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            self.fill(true)?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Append one read's worth of bytes. Returns false on a tolerated timeout.
    fn fill(&mut self, mid_frame: bool) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut && !mid_frame => return Ok(false),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(true);
        }
    }

    /// Counters since construction.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the synchronizer and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the payload ceiling for subsequent frames.
    pub fn set_max_payload_len(&mut self, max_payload_len: usize) {
        self.config.max_payload_len = max_payload_len;
    }

    /// Current synchronizer configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
