use crate::model::DeviceState;
use std::time::Duration;

/// How the simulated controller behaves for one device.
///
/// Progressions are reported one state per read after the corresponding mutating
/// call. Once a forget progression is exhausted the device disappears.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceScript {
    pub model: String,
    pub adopt: Vec<DeviceState>,
    pub update: Vec<DeviceState>,
    pub forget: Vec<DeviceState>,
    /// Mutating calls answered with `api.err.DeviceBusy` before one is accepted.
    pub busy: u32,
    pub busy_retry_after: Option<Duration>,
    /// Reads after a mutating call that report the device as not found.
    pub flicker: u32,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            model: "U6-Lite".to_string(),
            adopt: vec![DeviceState::Adopting, DeviceState::Provisioning, DeviceState::Connected],
            update: vec![DeviceState::Provisioning, DeviceState::Connected],
            forget: vec![DeviceState::Deleting],
            busy: 0,
            busy_retry_after: None,
            flicker: 0,
        }
    }
}

impl DeviceScript {
    pub fn with_adopt(mut self, states: impl IntoIterator<Item = DeviceState>) -> Self {
        self.adopt = states.into_iter().collect();
        self
    }

    pub fn with_update(mut self, states: impl IntoIterator<Item = DeviceState>) -> Self {
        self.update = states.into_iter().collect();
        self
    }

    pub fn with_forget(mut self, states: impl IntoIterator<Item = DeviceState>) -> Self {
        self.forget = states.into_iter().collect();
        self
    }

    pub fn with_busy(mut self, times: u32) -> Self {
        self.busy = times;
        self
    }

    pub fn with_busy_retry_after(mut self, hint: Duration) -> Self {
        self.busy_retry_after = Some(hint);
        self
    }

    pub fn with_flicker(mut self, reads: u32) -> Self {
        self.flicker = reads;
        self
    }
}
