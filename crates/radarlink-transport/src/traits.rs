use std::io::{Read, Write};

use crate::error::Result;
use crate::serial::PortSettings;

/// Raw device handle behind a [`DeviceStream`].
///
/// Implemented for serial ports; tests and replay tooling implement it for
/// in-memory sources.
pub trait DeviceIo: Read + Write + Send {
    /// Open a second handle to the same device.
    ///
    /// The reading thread owns its own handle so the lifecycle can release
    /// its copy without waiting for an in-flight read.
    fn try_clone_io(&self) -> std::io::Result<Box<dyn DeviceIo>>;
}

/// A connected device stream implementing Read + Write.
///
/// This is the fundamental I/O type returned by [`PortOpener::open`].
pub struct DeviceStream {
    name: String,
    inner: Box<dyn DeviceIo>,
}

impl DeviceStream {
    /// Wrap a device handle under a display name.
    pub fn new(name: impl Into<String>, inner: Box<dyn DeviceIo>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Device name this stream was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to clone this stream (opens a new handle to the same device).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = self.inner.try_clone_io()?;
        Ok(Self {
            name: self.name.clone(),
            inner,
        })
    }
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("name", &self.name)
            .finish()
    }
}

/// Opens device streams from port settings.
///
/// The port lifecycle holds one opener for its whole lifetime and calls it on
/// every initialization.
pub trait PortOpener: Send + Sync {
    /// Open the device described by `settings`.
    fn open(&self, settings: &PortSettings) -> Result<DeviceStream>;
}
