//! Controller
//!
//! The composition root of the engine: owns the transport, the receive
//! pipeline and the waiter for exactly one meter, and exposes the
//! send/receive/wait operations external callers (consoles, scripts) use.

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::commands::{Command, CommandKind};
use super::decoders::{default_decoder_table, DecoderRegistry};
use super::discovery;
use super::frame;
use super::receiver::FrameReceiver;
use super::state::{DeviceState, StateFlag};
use super::transport::{SerialTransportFactory, Transport, TransportFactory};
use super::waiter::ConditionWaiter;
use super::{ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL};

/// How long a backlight acknowledgment gets before the command is resent
const BACKLIGHT_ACK_TIMEOUT: Duration = Duration::from_millis(250);

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// How long discovery may sweep before giving up
    pub connect_timeout: Duration,
    /// Default timeout for waiting on a response
    pub wait_timeout: Duration,
    /// Poll interval of the wait loops
    pub poll_interval: Duration,
    /// Turn the backlight on after connecting and off before disconnecting
    pub backlight_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            connect_timeout: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(2),
            poll_interval: DEFAULT_POLL_INTERVAL,
            backlight_enabled: true,
        }
    }
}

/// Handle to one connected meter
pub struct DeviceController {
    transport: Box<dyn Transport>,
    port_name: Option<String>,
    receiver: FrameReceiver,
    waiter: ConditionWaiter,
    config: ControllerConfig,
    last_response_time_ms: Option<f64>,
    command_variation: u8,
    shutdown_done: bool,
}

impl DeviceController {
    /// Discover the meter on the system's serial ports and connect to it
    pub fn connect(config: ControllerConfig) -> Result<Self, ProtocolError> {
        let factory = SerialTransportFactory::new(config.baud_rate);
        Self::connect_with(&factory, config)
    }

    /// Discover and connect through a caller-provided factory
    pub fn connect_with(
        factory: &dyn TransportFactory,
        config: ControllerConfig,
    ) -> Result<Self, ProtocolError> {
        let (port_name, transport) = discovery::connect(
            factory,
            Command::ReadPowerAdcFrequency,
            config.connect_timeout,
        )?;
        let mut controller = Self::assemble(transport, Some(port_name), config)?;
        if controller.config.backlight_enabled {
            controller.turn_backlight(true)?;
        }
        Ok(controller)
    }

    /// Build a controller around an already-open transport.
    ///
    /// Skips discovery and the backlight-on handshake; used with the
    /// simulated meter and in tests.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        config: ControllerConfig,
    ) -> Result<Self, ProtocolError> {
        Self::assemble(transport, None, config)
    }

    fn assemble(
        transport: Box<dyn Transport>,
        port_name: Option<String>,
        config: ControllerConfig,
    ) -> Result<Self, ProtocolError> {
        let registry = DecoderRegistry::from_table(default_decoder_table())?;
        Ok(Self {
            transport,
            port_name,
            receiver: FrameReceiver::new(registry),
            waiter: ConditionWaiter::with_poll_interval(config.poll_interval),
            config,
            last_response_time_ms: None,
            command_variation: 0,
            shutdown_done: false,
        })
    }

    /// The port the meter was found on, if connected via discovery
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Last-known readings
    pub fn state(&self) -> &DeviceState {
        &self.receiver.state
    }

    /// Duration of the last completed update cycle in milliseconds
    pub fn last_response_time_ms(&self) -> Option<f64> {
        self.last_response_time_ms
    }

    /// Send a command to the meter.
    ///
    /// The changed flag belonging to the command's family is reset first,
    /// so a later wait cannot observe a stale value from a previous cycle.
    pub fn send_command(&mut self, command: Command) -> Result<(), ProtocolError> {
        match command.kind() {
            Some(CommandKind::PowerRequest) => self.receiver.state.clear(StateFlag::PowerData),
            Some(CommandKind::DisplaySettingsChange) => {
                self.receiver.state.clear(StateFlag::DisplaySettings)
            }
            None => {}
        }
        trace!(?command, "sending");
        self.transport.write_all(&frame::encode(command))?;
        Ok(())
    }

    /// One non-blocking pump of the receive pipeline.
    ///
    /// Returns how many frames a decoder handled.
    pub fn receive_available(&mut self) -> Result<usize, ProtocolError> {
        self.receiver.pump(self.transport.as_mut())
    }

    /// Wait until a power data frame has been decoded or `timeout` elapses
    pub fn wait_for_power_data_change(&mut self, timeout: Duration) -> bool {
        self.waiter.wait_for(
            self.transport.as_mut(),
            &mut self.receiver,
            StateFlag::PowerData,
            timeout,
        )
    }

    /// Wait until a display settings ack has arrived or `timeout` elapses
    pub fn wait_for_display_settings_change(&mut self, timeout: Duration) -> bool {
        self.waiter.wait_for(
            self.transport.as_mut(),
            &mut self.receiver,
            StateFlag::DisplaySettings,
            timeout,
        )
    }

    /// Run one polling cycle.
    ///
    /// The three power read commands are rotated so every cycle refreshes
    /// the power value and one of the secondary groups (battery and
    /// wavelength, ADC and frequency, reference power). Returns whether the
    /// response arrived within the configured wait timeout.
    pub fn update(&mut self) -> Result<bool, ProtocolError> {
        let start = Instant::now();
        self.command_variation = (self.command_variation + 1) % 3;
        let command = match self.command_variation {
            0 => Command::ReadPowerWavelengthBattery,
            1 => Command::ReadPowerAdcFrequency,
            _ => Command::ReadPowerReferencePower,
        };
        self.send_command(command)?;
        let answered = self.wait_for_power_data_change(self.config.wait_timeout);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.last_response_time_ms = Some(elapsed_ms);
        if answered {
            let state = &self.receiver.state;
            trace!(
                elapsed_ms,
                power = ?state.optical_power,
                wavelength_nm = ?state.wavelength_nm,
                battery_percent = ?state.battery_percent,
                "update cycle complete"
            );
        } else {
            debug!(?command, "update cycle timed out");
        }
        Ok(answered)
    }

    /// Turn the backlight on or off, resending once if the ack times out
    pub fn turn_backlight(&mut self, on: bool) -> Result<(), ProtocolError> {
        let command = if on {
            Command::TurnOnLedBacklight
        } else {
            Command::TurnOffLedBacklight
        };
        self.send_command(command)?;
        if !self.wait_for_display_settings_change(BACKLIGHT_ACK_TIMEOUT) {
            debug!(?command, "no backlight ack, resending");
            self.send_command(command)?;
        }
        Ok(())
    }

    /// Disconnect from the meter after the orderly shutdown sequence
    pub fn disconnect(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.shutdown_done {
            return;
        }
        self.shutdown_done = true;
        if self.config.backlight_enabled {
            if let Err(e) = self.turn_backlight(false) {
                warn!(error = %e, "backlight off failed during shutdown");
            }
        }
        if let Some(port) = &self.port_name {
            info!(port = %port, "disconnected");
        }
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
