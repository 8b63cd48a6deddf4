//! Protocol commands
//!
//! The static command table for the meter. Every command is a fixed
//! 13-byte template; the engine only reads templates and header codes from
//! this table, it never mutates it.

use serde::{Deserialize, Serialize};

use super::{FRAME_LEN, START_BYTE};

/// Commands understood by the meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Read current power, ADC value, modulation frequency and gear
    ReadPowerAdcFrequency,

    /// Read current power and the stored reference power
    ReadPowerReferencePower,

    /// Read current power, display mode, wavelength gear and battery level
    ReadPowerWavelengthBattery,

    /// Step the wavelength gear and report the reference power for it
    SwitchWavelengthGearAndReadReferencePower,

    /// Step the wavelength gear without a reference readback
    SwitchWavelengthGearDirectly,

    /// Display absolute power in microwatts
    SwitchPowerUnitToMicrowatt,

    /// Display absolute power in dBm
    SwitchPowerUnitToDbm,

    /// Show the stored reference value on the display
    SwitchToViewReferenceValueMode,

    /// Store the current reading as the reference value
    SetCurrentPowerAsReference,

    /// Backlight toggle as wired on the meter's own key
    SwitchLedBacklightOff,

    /// Force the LED backlight on
    TurnOnLedBacklight,

    /// Force the LED backlight off
    TurnOffLedBacklight,

    /// Trigger the auto power off function
    AutoPowerOff,

    /// Enable automatic shutdown
    AutomaticShutdownOn,

    /// Reset the stored reference value
    ResetPowerReferenceValue,

    /// Erase every EEPROM record
    DeleteAllEepromRecords,

    /// Clear the stored power record log
    ClearStoredRecords,

    /// Read one EEPROM address.
    ///
    /// Placeholder template: the address bytes are not filled in yet, see
    /// `frame::encode`.
    ReadEepromAddress,

    /// Report how many power records are stored
    StoredRecordCount,
}

/// Command families, taken from the function code (byte 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    /// "Send me the power" requests; answered with a power data frame
    PowerRequest = 0x01,

    /// Requests changing the device's display settings; answered with an ack
    DisplaySettingsChange = 0x02,
}

impl CommandKind {
    /// Classify a function code
    pub fn from_function_code(function_code: u8) -> Option<Self> {
        match function_code {
            0x01 => Some(CommandKind::PowerRequest),
            0x02 => Some(CommandKind::DisplaySettingsChange),
            _ => None,
        }
    }
}

const fn template(b1: u8, b2: u8, b3: u8, b4: u8) -> [u8; FRAME_LEN] {
    [START_BYTE, b1, b2, b3, b4, 0, 0, 0, 0, 0, 0, 0, 0]
}

impl Command {
    /// The 13-byte wire template for this command
    pub fn template(&self) -> [u8; FRAME_LEN] {
        match self {
            Command::ReadPowerAdcFrequency => template(0x01, 0x00, 0x00, 0x00),
            Command::ReadPowerReferencePower => template(0x01, 0x01, 0x00, 0x00),
            Command::ReadPowerWavelengthBattery => template(0x01, 0x80, 0x00, 0x00),
            Command::SwitchWavelengthGearAndReadReferencePower => {
                template(0x02, 0x01, 0x00, 0x00)
            }
            Command::SwitchWavelengthGearDirectly => template(0x02, 0x01, 0x01, 0x00),
            Command::SwitchPowerUnitToMicrowatt => template(0x02, 0x02, 0x00, 0x00),
            Command::SwitchPowerUnitToDbm => template(0x02, 0x02, 0x01, 0x00),
            Command::SwitchToViewReferenceValueMode => template(0x02, 0x03, 0x00, 0x00),
            Command::SetCurrentPowerAsReference => template(0x02, 0x03, 0x01, 0x00),
            Command::SwitchLedBacklightOff => template(0x02, 0x04, 0x00, 0x00),
            Command::TurnOnLedBacklight => template(0x02, 0x04, 0x01, 0x01),
            Command::TurnOffLedBacklight => template(0x02, 0x04, 0x01, 0x00),
            Command::AutoPowerOff => template(0x03, 0x07, 0x00, 0x00),
            Command::AutomaticShutdownOn => template(0x03, 0x07, 0x01, 0x00),
            Command::ResetPowerReferenceValue => template(0x05, 0x00, 0x00, 0x00),
            Command::DeleteAllEepromRecords => template(0x10, 0x00, 0x00, 0x00),
            Command::ClearStoredRecords => template(0x19, 0x00, 0x00, 0x00),
            Command::ReadEepromAddress => template(0x20, 0x00, 0x00, 0x00),
            Command::StoredRecordCount => template(0x22, 0x00, 0x00, 0x00),
        }
    }

    /// Function code (byte 1 of the template)
    pub fn function_code(&self) -> u8 {
        self.template()[1]
    }

    /// Sub-function code (byte 2 of the template)
    pub fn sub_function_code(&self) -> u8 {
        self.template()[2]
    }

    /// Which command family this belongs to, if any.
    ///
    /// Maintenance commands (EEPROM, shutdown, record log) have no kind and
    /// therefore no changed flag tied to them.
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_function_code(self.function_code())
    }
}
