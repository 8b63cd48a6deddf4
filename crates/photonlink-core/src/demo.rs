//! Demo Mode - Simulated meter for testing without hardware
//!
//! An in-memory [`Transport`] that behaves like a real optical power meter:
//! it parses the command frames written to it and queues protocol-correct
//! response frames, with a little jitter on the power reading so demo
//! output looks alive.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol::assembler::FrameAssembler;
use crate::protocol::frame::Frame;
use crate::protocol::transport::Transport;
use crate::protocol::{FRAME_LEN, START_BYTE};

/// Simulated meter state and wiring
#[derive(Debug)]
pub struct SimulatedMeter {
    /// Commands written by the controller, waiting to be parsed
    inbound: FrameAssembler,
    /// Response bytes the controller has not read yet
    outbound: VecDeque<u8>,
    rng: StdRng,

    base_power: u32,
    power_jitter: u32,
    reference_power: u32,
    adc_value: u16,
    frequency: u8,
    gear: u8,
    mode: u8,
    wavelength_index: u8,
    battery_level: u8,
    backlight_on: bool,
}

impl SimulatedMeter {
    /// A meter with typical mid-range readings and entropy-seeded jitter
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A meter with a fixed seed, for deterministic tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inbound: FrameAssembler::new(),
            outbound: VecDeque::new(),
            rng,
            base_power: 300,
            power_jitter: 4,
            reference_power: 250,
            adc_value: 1000,
            frequency: 0,
            gear: 2,
            mode: 0,
            wavelength_index: 2,
            battery_level: 3,
            backlight_on: false,
        }
    }

    /// Override the simulated power reading
    pub fn set_base_power(&mut self, base_power: u32, jitter: u32) {
        self.base_power = base_power;
        self.power_jitter = jitter;
    }

    /// Whether the last backlight command left the backlight on
    pub fn backlight_on(&self) -> bool {
        self.backlight_on
    }

    fn current_power(&mut self) -> u32 {
        if self.power_jitter == 0 {
            return self.base_power;
        }
        let jitter = self.rng.gen_range(0..=self.power_jitter * 2);
        (self.base_power + jitter).saturating_sub(self.power_jitter)
    }

    fn respond(&mut self, raw: [u8; FRAME_LEN]) {
        self.outbound.extend(raw);
    }

    fn handle_command(&mut self, command: Frame) {
        let (_, function_code, sub) = command.header();
        match (function_code, sub) {
            (0x01, 0x00) => {
                let power = self.current_power();
                let mut raw = [0u8; FRAME_LEN];
                raw[0] = START_BYTE;
                raw[1] = 0x01;
                raw[2] = 0x00;
                raw[5..9].copy_from_slice(&power.to_be_bytes());
                raw[9..11].copy_from_slice(&self.adc_value.to_be_bytes());
                raw[11] = self.frequency;
                raw[12] = self.gear;
                self.respond(raw);
            }
            (0x01, 0x01) => {
                let power = self.current_power();
                let mut raw = [0u8; FRAME_LEN];
                raw[0] = START_BYTE;
                raw[1] = 0x01;
                raw[2] = 0x01;
                raw[5..9].copy_from_slice(&power.to_be_bytes());
                raw[9..13].copy_from_slice(&self.reference_power.to_be_bytes());
                self.respond(raw);
            }
            (0x01, 0x80) => {
                let power = self.current_power();
                let mut raw = [0u8; FRAME_LEN];
                raw[0] = START_BYTE;
                raw[1] = 0x01;
                raw[2] = 0x80;
                raw[5..9].copy_from_slice(&power.to_be_bytes());
                raw[9] = self.mode;
                raw[10] = self.wavelength_index;
                raw[11] = self.battery_level;
                self.respond(raw);
            }
            (0x02, sub) => {
                // Settings change: track the interesting ones, ack them all.
                if sub == 0x04 {
                    self.backlight_on = command.as_bytes()[4] == 0x01;
                }
                if sub == 0x03 && command.as_bytes()[3] == 0x01 {
                    self.reference_power = self.base_power;
                }
                let mut raw = [0u8; FRAME_LEN];
                raw[0] = START_BYTE;
                raw[1] = 0x02;
                raw[2] = sub;
                self.respond(raw);
            }
            // Maintenance commands are accepted silently, like the device.
            _ => {}
        }
    }
}

impl Default for SimulatedMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for SimulatedMeter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.outbound.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Write for SimulatedMeter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbound.feed(buf);
        while let Some(command) = self.inbound.try_extract_frame() {
            self.handle_command(command);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for SimulatedMeter {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.outbound.len() as u32)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.outbound.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::Command;
    use pretty_assertions::assert_eq;

    fn send(meter: &mut SimulatedMeter, command: Command) -> Vec<u8> {
        meter.write_all(&command.template()).unwrap();
        let available = meter.bytes_to_read().unwrap() as usize;
        let mut buf = vec![0u8; available];
        meter.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn answers_power_requests_with_matching_codes() {
        let mut meter = SimulatedMeter::with_seed(7);
        meter.set_base_power(300, 0);

        let response = send(&mut meter, Command::ReadPowerWavelengthBattery);
        assert_eq!(response.len(), FRAME_LEN);
        assert_eq!(&response[..3], &[0xAA, 0x01, 0x80]);
        assert_eq!(&response[5..9], &300u32.to_be_bytes());
        assert_eq!(response[10], 2);
        assert_eq!(response[11], 3);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut meter = SimulatedMeter::with_seed(42);
        meter.set_base_power(300, 4);
        for _ in 0..100 {
            let power = meter.current_power();
            assert!((296..=304).contains(&power), "power {power}");
        }
    }

    #[test]
    fn acks_settings_commands_and_tracks_backlight() {
        let mut meter = SimulatedMeter::with_seed(7);
        let ack = send(&mut meter, Command::TurnOnLedBacklight);
        assert_eq!(&ack[..3], &[0xAA, 0x02, 0x04]);
        assert!(meter.backlight_on());

        let _ = send(&mut meter, Command::TurnOffLedBacklight);
        assert!(!meter.backlight_on());
    }

    #[test]
    fn maintenance_commands_get_no_response() {
        let mut meter = SimulatedMeter::with_seed(7);
        meter
            .write_all(&Command::DeleteAllEepromRecords.template())
            .unwrap();
        assert_eq!(meter.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn partial_writes_are_reassembled() {
        let mut meter = SimulatedMeter::with_seed(7);
        let template = Command::ReadPowerAdcFrequency.template();
        meter.write_all(&template[..6]).unwrap();
        assert_eq!(meter.bytes_to_read().unwrap(), 0);
        meter.write_all(&template[6..]).unwrap();
        assert_eq!(meter.bytes_to_read().unwrap(), FRAME_LEN as u32);
    }
}
