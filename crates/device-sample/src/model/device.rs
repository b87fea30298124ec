//! A network device as a controller reports it.
//!
//! The controller speaks in integer state codes; [`DeviceState::from_code`] turns them
//! into the engine-facing [`DeviceState`]. Codes without a mapping become
//! [`DeviceState::Unknown`], which the engine treats as implicitly pending.
use reconcile_engine::ObservableState;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lifecycle state of a device on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Disconnected,
    Connected,
    Pending,
    Upgrading,
    Provisioning,
    HeartbeatMissed,
    Adopting,
    Deleting,
    AdoptionFailed,
    Isolated,
    Unknown,
}

impl DeviceState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DeviceState::Disconnected,
            1 => DeviceState::Connected,
            2 => DeviceState::Pending,
            4 => DeviceState::Upgrading,
            5 => DeviceState::Provisioning,
            6 => DeviceState::HeartbeatMissed,
            7 => DeviceState::Adopting,
            8 => DeviceState::Deleting,
            10 => DeviceState::AdoptionFailed,
            11 => DeviceState::Isolated,
            _ => DeviceState::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DeviceState::Disconnected => 0,
            DeviceState::Connected => 1,
            DeviceState::Pending => 2,
            DeviceState::Upgrading => 4,
            DeviceState::Provisioning => 5,
            DeviceState::HeartbeatMissed => 6,
            DeviceState::Adopting => 7,
            DeviceState::Deleting => 8,
            DeviceState::AdoptionFailed => 10,
            DeviceState::Isolated => 11,
            DeviceState::Unknown => u8::MAX,
        }
    }
}

impl ObservableState for DeviceState {
    fn is_transient(&self) -> bool {
        matches!(self, DeviceState::Unknown)
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Device attributes, in the controller's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub mac: String,
    pub site: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(default)]
    pub port_profile: Option<String>,
    #[serde(rename = "state")]
    pub state_code: u8,
}

impl Device {
    pub fn state(&self) -> DeviceState {
        DeviceState::from_code(self.state_code)
    }
}

/// Desired configuration pushed with adopt and update calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub port_profile: Option<String>,
}

impl DeviceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            port_profile: None,
        }
    }

    pub fn with_port_profile(mut self, profile: impl Into<String>) -> Self {
        self.port_profile = Some(profile.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip_for_known_states() {
        for state in [
            DeviceState::Disconnected,
            DeviceState::Connected,
            DeviceState::Adopting,
            DeviceState::Deleting,
        ] {
            assert_eq!(DeviceState::from_code(state.code()), state);
        }
    }

    #[test]
    fn unknown_codes_are_transient() {
        let state = DeviceState::from_code(42);
        assert_eq!(state, DeviceState::Unknown);
        assert!(state.is_transient());
        assert!(!DeviceState::Pending.is_transient());
    }

    #[test]
    fn device_parses_from_wire_json() {
        let device: Device = serde_json::from_str(
            r#"{"mac":"aa:bb:cc:dd:ee:ff","site":"default","model":"U6-Lite","state":7}"#,
        )
        .unwrap();

        assert_eq!(device.state(), DeviceState::Adopting);
        assert_eq!(device.name, None);
    }
}
