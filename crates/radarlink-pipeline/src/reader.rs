use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use radarlink_frame::{FrameSynchronizer, SyncStats};
use radarlink_transport::DeviceStream;
use tracing::trace;

use crate::event::PortState;
use crate::handoff::HandoffBuffer;
use crate::lifecycle::StateCell;

/// Data port handle read by the synchronizer thread.
///
/// The lifecycle keeps a clone and can release the device even when the
/// thread reading it has been detached. Reads after release fail with
/// `NotConnected`.
#[derive(Clone)]
pub(crate) struct ReleasablePort(Arc<Mutex<Option<DeviceStream>>>);

impl ReleasablePort {
    pub(crate) fn new(stream: DeviceStream) -> Self {
        Self(Arc::new(Mutex::new(Some(stream))))
    }

    /// Close the device handle. Blocks until an in-flight read returns.
    pub(crate) fn release(&self) {
        let stream = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(stream);
    }
}

impl Read for ReleasablePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some(stream) => stream.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "data port released",
            )),
        }
    }
}

/// Synchronizer loop feeding the handoff buffer.
///
/// Reads only while the lifecycle is `Running`; otherwise idles without
/// touching the device. Cancellation is checked after every read.
pub(crate) struct FrameReader<R> {
    sync: FrameSynchronizer<R>,
    buffer: Arc<HandoffBuffer>,
    cancel: Arc<AtomicBool>,
    state: StateCell,
    idle: Duration,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(
        sync: FrameSynchronizer<R>,
        buffer: Arc<HandoffBuffer>,
        cancel: Arc<AtomicBool>,
        state: StateCell,
        idle: Duration,
    ) -> Self {
        Self {
            sync,
            buffer,
            cancel,
            state,
            idle,
        }
    }

    /// Returns the synchronizer counters on cancellation, or the fault that
    /// ended reading.
    pub(crate) fn run(mut self) -> radarlink_frame::Result<SyncStats> {
        while !self.cancel.load(Ordering::Acquire) {
            if self.state.get() != PortState::Running {
                thread::sleep(self.idle);
                continue;
            }

            if let Some(frame) = self.sync.poll_frame()? {
                trace!(
                    frame_number = frame.header.frame_number,
                    payload_len = frame.payload.len(),
                    "frame synchronized"
                );
                self.buffer.push(frame);
            }
        }
        Ok(self.sync.stats())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use radarlink_frame::{FrameBuilder, FrameError};

    use super::*;

    fn capture(frames: u32) -> Vec<u8> {
        let mut bytes = b"boot noise".to_vec();
        for n in 0..frames {
            bytes.extend_from_slice(&FrameBuilder::new(n).presence(true).to_bytes());
        }
        bytes
    }

    fn reader(bytes: Vec<u8>, state: PortState) -> (FrameReader<Cursor<Vec<u8>>>, Arc<HandoffBuffer>) {
        let buffer = Arc::new(HandoffBuffer::new(16));
        let cell = StateCell::new(state);
        let reader = FrameReader::new(
            FrameSynchronizer::new(Cursor::new(bytes)),
            Arc::clone(&buffer),
            Arc::new(AtomicBool::new(false)),
            cell,
            Duration::from_millis(1),
        );
        (reader, buffer)
    }

    #[test]
    fn frames_reach_buffer_until_source_ends() {
        let (reader, buffer) = reader(capture(3), PortState::Running);

        let err = reader.run().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop().unwrap().header.frame_number, 0);
    }

    #[test]
    fn released_port_stops_reading() {
        let device = Cursor::new(capture(1));
        let mut port = ReleasablePort::new(DeviceStream::new("mem", Box::new(MemDevice(device))));
        let handle = port.clone();

        let mut byte = [0u8; 1];
        assert_eq!(port.read(&mut byte).unwrap(), 1);
        handle.release();
        let err = port.read(&mut byte).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    struct MemDevice(Cursor<Vec<u8>>);

    impl Read for MemDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl std::io::Write for MemDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl radarlink_transport::DeviceIo for MemDevice {
        fn try_clone_io(&self) -> io::Result<Box<dyn radarlink_transport::DeviceIo>> {
            Ok(Box::new(MemDevice(self.0.clone())))
        }
    }

    #[test]
    fn paused_reader_leaves_device_untouched() {
        let (reader, buffer) = reader(capture(2), PortState::Paused);
        let cancel = Arc::clone(&reader.cancel);

        let handle = thread::spawn(move || reader.run());
        thread::sleep(Duration::from_millis(20));
        cancel.store(true, Ordering::Release);

        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.bytes_scanned, 0);
        assert!(buffer.is_empty());
    }
}
