//! Frame encoding/decoding
//!
//! Implements the fixed 13-byte wire frame shared by every command and
//! response:
//!
//! - 1 byte: start marker (0xAA)
//! - 1 byte: function code (command family)
//! - 1 byte: sub-function code (command variant)
//! - 2 bytes: reserved
//! - 8 bytes: payload, interpreted per (function code, sub-function code)
//!
//! Multi-byte payload fields are big-endian unsigned integers.

use byteorder::{BigEndian, ByteOrder};

use super::commands::Command;
use super::{ProtocolError, FRAME_LEN, PAYLOAD_OFFSET, START_BYTE};

/// One 13-byte protocol frame (command or response)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Decode a frame from raw bytes, checking only the length
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let raw: [u8; FRAME_LEN] = data
            .try_into()
            .map_err(|_| ProtocolError::Length { actual: data.len() })?;
        Ok(Self(raw))
    }

    /// Start marker (byte 0)
    pub fn start_byte(&self) -> u8 {
        self.0[0]
    }

    /// Function code (byte 1)
    pub fn function_code(&self) -> u8 {
        self.0[1]
    }

    /// Sub-function code (byte 2)
    pub fn sub_function_code(&self) -> u8 {
        self.0[2]
    }

    /// Header triple: (start byte, function code, sub-function code)
    pub fn header(&self) -> (u8, u8, u8) {
        (self.0[0], self.0[1], self.0[2])
    }

    /// Payload slice (bytes 5..13)
    pub fn payload(&self) -> &[u8] {
        &self.0[PAYLOAD_OFFSET..]
    }

    /// The raw frame bytes
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Whether the start marker is correct
    pub fn has_start_byte(&self) -> bool {
        self.0[0] == START_BYTE
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(raw: [u8; FRAME_LEN]) -> Self {
        Self(raw)
    }
}

/// Encode a command for transmission.
///
/// Commands are pre-encoded 13-byte templates, so today this is an identity
/// pass-through. It is the seam where parameterized commands (the
/// address-bearing EEPROM read) will be filled in once their payload layout
/// is settled.
pub fn encode(command: Command) -> [u8; FRAME_LEN] {
    command.template()
}

/// Extract a big-endian unsigned integer from `data[start..end]`.
///
/// Supports 1, 2 and 4 byte fields; any other width is an error.
pub fn extract_field(data: &[u8], start: usize, end: usize) -> Result<u64, ProtocolError> {
    let width = end.saturating_sub(start);
    if end > data.len() {
        return Err(ProtocolError::Length { actual: data.len() });
    }
    let field = &data[start..end];
    match width {
        1 => Ok(u64::from(field[0])),
        2 => Ok(u64::from(BigEndian::read_u16(field))),
        4 => Ok(u64::from(BigEndian::read_u32(field))),
        other => Err(ProtocolError::UnsupportedFieldWidth(other)),
    }
}

/// Map a wavelength gear index to nanometers.
///
/// Returns `None` for indices the meter does not define.
pub fn wavelength_from_index(index: u8) -> Option<u16> {
    match index {
        0 => Some(850),
        1 => Some(1300),
        2 => Some(1310),
        3 => Some(1490),
        4 => Some(1550),
        5 => Some(1625),
        _ => None,
    }
}

/// Convert the meter's 0..=3 battery level to a percentage.
///
/// The display has three bars plus empty, so level 0 is 25 percent and
/// level 3 is 100. Levels above 3 clamp to 100.
pub fn battery_percent_from_level(level: u8) -> u8 {
    let percent = (u16::from(level) + 1) * 25;
    percent.min(100) as u8
}
