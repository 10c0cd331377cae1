use std::time::Duration;

use radarlink_frame::{SyncConfig, DEFAULT_MAX_PAYLOAD};
use radarlink_transport::serial::{DEFAULT_CLI_BAUD, DEFAULT_DATA_BAUD};
use radarlink_transport::PortSettings;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handoff::DEFAULT_HANDOFF_CAPACITY;

/// Settings for one sensor module and the pipeline reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Name reported alongside emitted events.
    pub identifier: String,
    /// Device name of the data stream.
    pub data_port: String,
    /// Device name of the command stream.
    pub cli_port: String,
    pub data_baud: u32,
    pub cli_baud: u32,
    /// Raw frames held between the reading thread and the decode worker.
    pub handoff_capacity: usize,
    /// Largest TLV payload accepted from the data stream, in bytes.
    pub max_payload_len: usize,
    /// Data port read timeout; bounds how long pause and stop take to be seen.
    pub read_timeout_ms: u64,
    /// Command port write timeout.
    pub write_timeout_ms: u64,
    /// How long `stop` waits for the background threads before releasing ports.
    pub stop_timeout_ms: u64,
    /// Pause between configuration lines sent to the command port.
    pub config_line_delay_ms: u64,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            identifier: "module-0".to_string(),
            data_port: String::new(),
            cli_port: String::new(),
            data_baud: DEFAULT_DATA_BAUD,
            cli_baud: DEFAULT_CLI_BAUD,
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            max_payload_len: DEFAULT_MAX_PAYLOAD,
            read_timeout_ms: 50,
            write_timeout_ms: 5_000,
            stop_timeout_ms: 100,
            config_line_delay_ms: 10,
        }
    }
}

impl ModuleConfig {
    /// Parse settings from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Port settings for the data stream.
    pub fn data_settings(&self) -> PortSettings {
        PortSettings::new(&self.data_port, self.data_baud)
            .with_timeout(Duration::from_millis(self.read_timeout_ms))
    }

    /// Port settings for the command stream.
    pub fn cli_settings(&self) -> PortSettings {
        PortSettings::new(&self.cli_port, self.cli_baud)
            .with_timeout(Duration::from_millis(self.write_timeout_ms))
    }

    /// Synchronizer settings for the data stream.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_payload_len: self.max_payload_len,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn config_line_delay(&self) -> Duration {
        Duration::from_millis(self.config_line_delay_ms)
    }
}
