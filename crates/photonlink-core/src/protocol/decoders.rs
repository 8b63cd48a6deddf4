//! Response decoders
//!
//! Each decoder interprets the payload of one (function code, sub-function
//! code) pair into `DeviceState` fields and marks the state groups it
//! touched. The registry is assembled once at startup from an explicit
//! table; lookup happens per received frame.

use std::collections::HashMap;

use tracing::debug;

use super::frame::{self, Frame};
use super::state::{DeviceState, StateFlag};
use super::ProtocolError;

/// A payload decoder for one frame shape.
///
/// Implementations must limit their side effects to writing `DeviceState`
/// fields and marking the flags for exactly the groups they touched.
pub trait FrameDecoder: Send + std::fmt::Debug {
    /// Interpret `payload` (frame bytes 5..13) into `state`
    fn decode(&self, state: &mut DeviceState, payload: &[u8]) -> Result<(), ProtocolError>;
}

/// Registry key: a function code with either one sub-function code or all
/// of them.
///
/// Exact keys win over family keys, so an ack family can claim a whole
/// function code while specific sub-codes still get their own decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderKey {
    /// Function code (frame byte 1)
    pub function_code: u8,
    /// Sub-function code (frame byte 2), or `None` for the whole family
    pub sub_function_code: Option<u8>,
}

impl DecoderKey {
    /// Key for one exact (function, sub-function) pair
    pub fn exact(function_code: u8, sub_function_code: u8) -> Self {
        Self {
            function_code,
            sub_function_code: Some(sub_function_code),
        }
    }

    /// Key matching every sub-code of a function code
    pub fn family(function_code: u8) -> Self {
        Self {
            function_code,
            sub_function_code: None,
        }
    }
}

/// One row of a registration table
pub type DecoderEntry = (DecoderKey, Box<dyn FrameDecoder>);

/// Maps header codes to decoders
#[derive(Debug)]
pub struct DecoderRegistry {
    decoders: HashMap<DecoderKey, Box<dyn FrameDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Build a registry from a registration table, rejecting duplicates
    pub fn from_table(entries: Vec<DecoderEntry>) -> Result<Self, ProtocolError> {
        let mut registry = Self::new();
        for (key, decoder) in entries {
            registry.register(key, decoder)?;
        }
        Ok(registry)
    }

    /// Register one decoder. A duplicate key is a configuration error.
    pub fn register(
        &mut self,
        key: DecoderKey,
        decoder: Box<dyn FrameDecoder>,
    ) -> Result<(), ProtocolError> {
        if self.decoders.contains_key(&key) {
            return Err(ProtocolError::DuplicateDecoder {
                function_code: key.function_code,
                sub_function_code: key.sub_function_code,
            });
        }
        self.decoders.insert(key, decoder);
        Ok(())
    }

    /// Decode `frame` into `state` if a decoder is registered for it.
    ///
    /// Returns whether a decoder matched. An unknown pair is not an error;
    /// the caller decides how to report unhandled frames.
    pub fn dispatch(&self, state: &mut DeviceState, frame: &Frame) -> Result<bool, ProtocolError> {
        let (_, function_code, sub_function_code) = frame.header();
        let decoder = self
            .decoders
            .get(&DecoderKey::exact(function_code, sub_function_code))
            .or_else(|| self.decoders.get(&DecoderKey::family(function_code)));
        match decoder {
            Some(decoder) => {
                decoder.decode(state, frame.payload())?;
                Ok(true)
            }
            None => {
                debug!(function_code, sub_function_code, "no decoder for frame");
                Ok(false)
            }
        }
    }

    /// Number of registered decoders
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Power, ADC value, modulation frequency and gear (0x01, 0x00)
#[derive(Debug)]
pub struct PowerAdcFrequencyDecoder;

impl FrameDecoder for PowerAdcFrequencyDecoder {
    fn decode(&self, state: &mut DeviceState, payload: &[u8]) -> Result<(), ProtocolError> {
        state.optical_power = Some(frame::extract_field(payload, 0, 4)? as u32);
        state.adc_value = Some(frame::extract_field(payload, 4, 6)? as u16);
        state.frequency = Some(frame::extract_field(payload, 6, 7)? as u8);
        state.power_adjustment_gear = Some(frame::extract_field(payload, 7, 8)? as u8);
        state.mark(StateFlag::PowerData);
        Ok(())
    }
}

/// Power and stored reference power (0x01, 0x01)
#[derive(Debug)]
pub struct PowerReferenceDecoder;

impl FrameDecoder for PowerReferenceDecoder {
    fn decode(&self, state: &mut DeviceState, payload: &[u8]) -> Result<(), ProtocolError> {
        state.optical_power = Some(frame::extract_field(payload, 0, 4)? as u32);
        state.reference_power = Some(frame::extract_field(payload, 4, 8)? as u32);
        state.mark(StateFlag::PowerData);
        Ok(())
    }
}

/// Power, display mode, wavelength gear and battery level (0x01, 0x80)
#[derive(Debug)]
pub struct PowerWavelengthBatteryDecoder;

impl FrameDecoder for PowerWavelengthBatteryDecoder {
    fn decode(&self, state: &mut DeviceState, payload: &[u8]) -> Result<(), ProtocolError> {
        state.optical_power = Some(frame::extract_field(payload, 0, 4)? as u32);
        state.mode = Some(frame::extract_field(payload, 4, 5)? as u8);
        state.wavelength_nm =
            frame::wavelength_from_index(frame::extract_field(payload, 5, 6)? as u8);
        state.battery_percent = Some(frame::battery_percent_from_level(
            frame::extract_field(payload, 6, 7)? as u8,
        ));
        state.mark(StateFlag::PowerData);
        Ok(())
    }
}

/// Acknowledgment of any display settings change (0x02, any sub-code).
///
/// Backlight toggles, unit switches and reference value changes all answer
/// from the same function family; the payload carries nothing we keep.
#[derive(Debug)]
pub struct DisplaySettingsChangedDecoder;

impl FrameDecoder for DisplaySettingsChangedDecoder {
    fn decode(&self, state: &mut DeviceState, _payload: &[u8]) -> Result<(), ProtocolError> {
        state.mark(StateFlag::DisplaySettings);
        Ok(())
    }
}

/// The registration table the engine starts with
pub fn default_decoder_table() -> Vec<DecoderEntry> {
    vec![
        (
            DecoderKey::exact(0x01, 0x00),
            Box::new(PowerAdcFrequencyDecoder),
        ),
        (DecoderKey::exact(0x01, 0x01), Box::new(PowerReferenceDecoder)),
        (
            DecoderKey::exact(0x01, 0x80),
            Box::new(PowerWavelengthBatteryDecoder),
        ),
        (
            DecoderKey::family(0x02),
            Box::new(DisplaySettingsChangedDecoder),
        ),
    ]
}
