//! Device state
//!
//! The last-known decoded readings of one meter. Every field starts unset
//! and is filled in by decoders as responses arrive. Two changed flags track
//! whether a decoder has touched the power data or the display settings
//! since the last successful wait; decoders only ever set them, the waiter
//! is the only place they are cleared.

use serde::{Deserialize, Serialize};

/// Selector for one of the changed flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateFlag {
    /// Power data fields were written by a decoder
    PowerData,
    /// A display settings acknowledgment arrived
    DisplaySettings,
}

/// Last-known readings of the connected meter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceState {
    /// Current optical power, raw device units
    pub optical_power: Option<u32>,

    /// Stored reference power, raw device units
    pub reference_power: Option<u32>,

    /// Raw ADC reading behind the power value
    pub adc_value: Option<u16>,

    /// Detected modulation frequency code
    pub frequency: Option<u8>,

    /// Power adjustment gear
    pub power_adjustment_gear: Option<u8>,

    /// Display mode
    pub mode: Option<u8>,

    /// Selected wavelength in nanometers; `None` until known or when the
    /// device reports a gear index outside the wavelength table
    pub wavelength_nm: Option<u16>,

    /// Battery level as a percentage
    pub battery_percent: Option<u8>,

    power_data_changed: bool,
    display_settings_changed: bool,
}

impl DeviceState {
    /// A state with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a changed flag. Called by decoders after writing fields.
    pub fn mark(&mut self, flag: StateFlag) {
        match flag {
            StateFlag::PowerData => self.power_data_changed = true,
            StateFlag::DisplaySettings => self.display_settings_changed = true,
        }
    }

    /// Read a changed flag
    pub fn is_set(&self, flag: StateFlag) -> bool {
        match flag {
            StateFlag::PowerData => self.power_data_changed,
            StateFlag::DisplaySettings => self.display_settings_changed,
        }
    }

    /// Clear a changed flag
    pub fn clear(&mut self, flag: StateFlag) {
        match flag {
            StateFlag::PowerData => self.power_data_changed = false,
            StateFlag::DisplaySettings => self.display_settings_changed = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_everything_unset() {
        let state = DeviceState::new();
        assert_eq!(state.optical_power, None);
        assert_eq!(state.reference_power, None);
        assert_eq!(state.adc_value, None);
        assert_eq!(state.frequency, None);
        assert_eq!(state.power_adjustment_gear, None);
        assert_eq!(state.mode, None);
        assert_eq!(state.wavelength_nm, None);
        assert_eq!(state.battery_percent, None);
        assert!(!state.is_set(StateFlag::PowerData));
        assert!(!state.is_set(StateFlag::DisplaySettings));
    }

    #[test]
    fn flags_are_independent() {
        let mut state = DeviceState::new();
        state.mark(StateFlag::PowerData);
        assert!(state.is_set(StateFlag::PowerData));
        assert!(!state.is_set(StateFlag::DisplaySettings));

        state.mark(StateFlag::DisplaySettings);
        state.clear(StateFlag::PowerData);
        assert!(!state.is_set(StateFlag::PowerData));
        assert!(state.is_set(StateFlag::DisplaySettings));
    }

    #[test]
    fn serializes_readings_for_external_consumers() {
        let mut state = DeviceState::new();
        state.optical_power = Some(300);
        state.wavelength_nm = Some(1310);
        state.battery_percent = Some(50);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["optical_power"], 300);
        assert_eq!(json["wavelength_nm"], 1310);
        assert_eq!(json["battery_percent"], 50);
    }
}
