use serde::Serialize;

use crate::pairing::PairedEvent;

/// Port lifecycle state of a sensor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PortState {
    /// No ports open. `initialize_ports` is the only useful call.
    AwaitingPortInit = 0,
    /// Ports open, reading idle.
    Paused = 1,
    /// Ports open, frames flowing.
    Running = 2,
}

impl PortState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PortState::Paused,
            2 => PortState::Running,
            _ => PortState::AwaitingPortInit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortState::AwaitingPortInit => "awaiting_port_init",
            PortState::Paused => "paused",
            PortState::Running => "running",
        }
    }
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a [`ModuleIo`](crate::ModuleIo) reports to its consumer.
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// A decoded frame with confirmed track ids.
    Frame(PairedEvent),
    /// The data port failed; ports are closed and the module awaits init.
    ConnectionLost { reason: String },
    /// The lifecycle moved to a new state.
    StateChanged(PortState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            PortState::AwaitingPortInit,
            PortState::Paused,
            PortState::Running,
        ] {
            assert_eq!(PortState::from_u8(state as u8), state);
        }
        assert_eq!(PortState::from_u8(200), PortState::AwaitingPortInit);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&PortState::AwaitingPortInit).unwrap();
        assert_eq!(json, "\"awaiting_port_init\"");
        assert_eq!(PortState::Running.to_string(), "running");
    }
}
