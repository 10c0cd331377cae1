use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{DeviceIo, DeviceStream, PortOpener};

/// Default baud rate of the sensor's data stream.
pub const DEFAULT_DATA_BAUD: u32 = 921_600;

/// Default baud rate of the sensor's command stream.
pub const DEFAULT_CLI_BAUD: u32 = 115_200;

/// Settings for one serial endpoint (always 8 data bits, no parity, 1 stop bit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// OS device name, e.g. `/dev/ttyUSB1` or `COM4`.
    pub port_name: String,
    /// Line rate in baud.
    pub baud_rate: u32,
    /// Timeout applied to blocking reads and writes.
    ///
    /// Short read timeouts let the reading thread observe pause and
    /// cancellation while the device is quiet.
    pub timeout: Duration,
}

impl PortSettings {
    /// Settings for a named port at the given baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_millis(50),
        }
    }

    /// Override the blocking I/O timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_DATA_BAUD)
    }
}

/// Opens real serial devices through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    fn open(&self, settings: &PortSettings) -> Result<DeviceStream> {
        let port = serialport::new(&settings.port_name, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.timeout)
            .open()
            .map_err(|err| TransportError::Open {
                port: settings.port_name.clone(),
                baud_rate: settings.baud_rate,
                source: err.into(),
            })?;

        info!(
            port = %settings.port_name,
            baud = settings.baud_rate,
            "opened serial port"
        );
        Ok(DeviceStream::new(
            settings.port_name.clone(),
            Box::new(SerialDevice(port)),
        ))
    }
}

struct SerialDevice(Box<dyn SerialPort>);

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SerialDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl DeviceIo for SerialDevice {
    fn try_clone_io(&self) -> std::io::Result<Box<dyn DeviceIo>> {
        let cloned = self.0.try_clone()?;
        debug!(port = ?self.0.name(), "cloned serial handle");
        Ok(Box::new(SerialDevice(cloned)))
    }
}

/// A serial port visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS device name.
    pub port_name: String,
    /// Bus the device hangs off (`usb`, `pci`, `bluetooth`, `unknown`).
    pub kind: &'static str,
    /// USB product string, when the device reports one.
    pub product: Option<String>,
}

/// Enumerate serial ports present on the host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports =
        serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                port_name: port.port_name,
                kind,
                product,
            }
        })
        .collect())
}
