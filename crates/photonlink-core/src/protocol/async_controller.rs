//! Async controller
//!
//! The cooperative-suspension twin of [`DeviceController`]: the same
//! send/wait/update semantics with every pause expressed as an await point,
//! so a meter can be polled from a tokio task without blocking a thread.
//! Serial I/O comes from tokio-serial; any other `AsyncRead + AsyncWrite`
//! transport (an in-memory duplex, a pty) works the same way.
//!
//! [`DeviceController`]: super::controller::DeviceController

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use super::commands::{Command, CommandKind};
use super::controller::ControllerConfig;
use super::decoders::{default_decoder_table, DecoderRegistry};
use super::discovery::PROBE_SETTLE;
use super::frame;
use super::receiver::FrameReceiver;
use super::serial::list_ports;
use super::state::{DeviceState, StateFlag};
use super::{validator, ProtocolError, FRAME_LEN};

/// How long a backlight acknowledgment gets before the command is resent
const BACKLIGHT_ACK_TIMEOUT: Duration = Duration::from_millis(250);

/// Pause between discovery sweeps
const SWEEP_DELAY: Duration = Duration::from_millis(500);

/// Pause between background update cycles
const CYCLE_PAUSE: Duration = Duration::from_millis(1);

/// Read slice used when draining the transport
const READ_CHUNK: usize = 64;

/// Handle to one meter, driven from async code
pub struct AsyncDeviceController<T> {
    transport: T,
    port_name: Option<String>,
    receiver: FrameReceiver,
    config: ControllerConfig,
    last_response_time_ms: Option<f64>,
    command_variation: u8,
}

impl AsyncDeviceController<tokio_serial::SerialStream> {
    /// Discover the meter on the system's serial ports and connect to it
    pub async fn connect(config: ControllerConfig) -> Result<Self, ProtocolError> {
        let start = std::time::Instant::now();
        let (port_name, transport) = loop {
            if start.elapsed() > config.connect_timeout {
                warn!("connection timeout, no meter found");
                return Err(ProtocolError::ConnectionTimeout);
            }
            if let Some(name) = probe_ports(config.baud_rate).await {
                let stream = open_stream(&name, config.baud_rate)?;
                info!(port = %name, "connected to meter");
                break (name, stream);
            }
            debug!("meter not found, retrying");
            sleep(SWEEP_DELAY).await;
        };

        let mut controller = Self::assemble(transport, Some(port_name), config)?;
        if controller.config.backlight_enabled {
            controller.turn_backlight(true).await?;
        }
        Ok(controller)
    }
}

impl<T> AsyncDeviceController<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Build a controller around an already-open async transport
    pub fn with_transport(transport: T, config: ControllerConfig) -> Result<Self, ProtocolError> {
        Self::assemble(transport, None, config)
    }

    fn assemble(
        transport: T,
        port_name: Option<String>,
        config: ControllerConfig,
    ) -> Result<Self, ProtocolError> {
        let registry = DecoderRegistry::from_table(default_decoder_table())?;
        Ok(Self {
            transport,
            port_name,
            receiver: FrameReceiver::new(registry),
            config,
            last_response_time_ms: None,
            command_variation: 0,
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

    /// Send a command, resetting the changed flag of its family first
    pub async fn send_command(&mut self, command: Command) -> Result<(), ProtocolError> {
        match command.kind() {
            Some(CommandKind::PowerRequest) => self.receiver.state.clear(StateFlag::PowerData),
            Some(CommandKind::DisplaySettingsChange) => {
                self.receiver.state.clear(StateFlag::DisplaySettings)
            }
            None => {}
        }
        trace!(?command, "sending");
        self.transport.write_all(&frame::encode(command)).await?;
        Ok(())
    }

    /// One pump of the receive pipeline: drain whatever the transport has
    /// buffered right now and dispatch every complete frame
    pub async fn receive_available(&mut self) -> Result<usize, ProtocolError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match timeout(Duration::from_millis(1), self.transport.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => self.receiver.assembler.feed(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                // Nothing buffered right now.
                Err(_) => break,
            }
        }
        self.receiver.dispatch_buffered()
    }

    /// Wait until `flag` is observed or `timeout_after` elapses.
    ///
    /// Clears the flag on success; a timeout returns `false` without error.
    pub async fn wait_for(&mut self, flag: StateFlag, timeout_after: Duration) -> bool {
        let deadline = Instant::now() + timeout_after;
        loop {
            if let Err(e) = self.receive_available().await {
                debug!(error = %e, "pump failed while waiting");
            }
            if self.receiver.state.is_set(flag) {
                self.receiver.state.clear(flag);
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Wait for a decoded power data frame
    pub async fn wait_for_power_data_change(&mut self, timeout_after: Duration) -> bool {
        self.wait_for(StateFlag::PowerData, timeout_after).await
    }

    /// Wait for a display settings acknowledgment
    pub async fn wait_for_display_settings_change(&mut self, timeout_after: Duration) -> bool {
        self.wait_for(StateFlag::DisplaySettings, timeout_after).await
    }

    /// Run one polling cycle, rotating the three power read commands
    pub async fn update(&mut self) -> Result<bool, ProtocolError> {
        let start = std::time::Instant::now();
        self.command_variation = (self.command_variation + 1) % 3;
        let command = match self.command_variation {
            0 => Command::ReadPowerWavelengthBattery,
            1 => Command::ReadPowerAdcFrequency,
            _ => Command::ReadPowerReferencePower,
        };
        self.send_command(command).await?;
        let answered = self
            .wait_for_power_data_change(self.config.wait_timeout)
            .await;
        self.last_response_time_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
        if !answered {
            debug!(?command, "update cycle timed out");
        }
        Ok(answered)
    }

    /// Turn the backlight on or off, resending once if the ack times out
    pub async fn turn_backlight(&mut self, on: bool) -> Result<(), ProtocolError> {
        let command = if on {
            Command::TurnOnLedBacklight
        } else {
            Command::TurnOffLedBacklight
        };
        self.send_command(command).await?;
        if !self
            .wait_for_display_settings_change(BACKLIGHT_ACK_TIMEOUT)
            .await
        {
            debug!(?command, "no backlight ack, resending");
            self.send_command(command).await?;
        }
        Ok(())
    }

    /// Orderly shutdown: backlight off (when enabled), then drop the
    /// transport.
    ///
    /// Drop cannot await, so the shutdown sequence is an explicit call on
    /// this controller.
    pub async fn disconnect(mut self) {
        if self.config.backlight_enabled {
            if let Err(e) = self.turn_backlight(false).await {
                warn!(error = %e, "backlight off failed during shutdown");
            }
        }
        if let Some(port) = &self.port_name {
            info!(port = %port, "disconnected");
        }
    }
}

fn open_stream(
    port_name: &str,
    baud_rate: u32,
) -> Result<tokio_serial::SerialStream, ProtocolError> {
    tokio_serial::new(port_name, baud_rate)
        .open_native_async()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// One async sweep over the system's serial ports
async fn probe_ports(baud_rate: u32) -> Option<String> {
    for port in list_ports() {
        debug!(port = %port.name, "probing");
        match probe_one(&port.name, baud_rate).await {
            Ok(()) => {
                info!(port = %port.name, "valid probe response");
                return Some(port.name);
            }
            Err(e) => {
                debug!(port = %port.name, error = %e, "probe failed");
            }
        }
    }
    None
}

async fn probe_one(port_name: &str, baud_rate: u32) -> Result<(), ProtocolError> {
    let probe_command = Command::ReadPowerAdcFrequency;
    // The stream drops (and the port closes) on every exit path.
    let mut stream = open_stream(port_name, baud_rate)?;
    stream.write_all(&probe_command.template()).await?;
    sleep(PROBE_SETTLE).await;

    let mut buf = [0u8; FRAME_LEN];
    timeout(Duration::from_millis(100), stream.read_exact(&mut buf))
        .await
        .map_err(|_| {
            ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "probe read timed out",
            ))
        })??;
    validator::check_response(
        &buf,
        probe_command.function_code(),
        probe_command.sub_function_code(),
    )?;
    Ok(())
}

/// A controller being polled by a background tokio task
pub struct AsyncBackgroundPoller<T> {
    stop: watch::Sender<bool>,
    handle: JoinHandle<AsyncDeviceController<T>>,
}

impl<T> AsyncBackgroundPoller<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Move `controller` into a tokio task and start polling.
    ///
    /// The task owns the controller, so exactly one exchange is in flight
    /// at any time; the stop signal is honored between update cycles.
    pub fn spawn(mut controller: AsyncDeviceController<T>) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            while !*stop_rx.borrow() {
                if let Err(e) = controller.update().await {
                    warn!(error = %e, "update cycle failed");
                }
                sleep(CYCLE_PAUSE).await;
            }
            controller
        });
        Self { stop, handle }
    }

    /// Whether the polling task has already exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop, let the current cycle finish, and get the
    /// controller back
    pub async fn stop(self) -> AsyncDeviceController<T> {
        let _ = self.stop.send(true);
        match self.handle.await {
            Ok(controller) => controller,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => panic!("poller task ended unexpectedly: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn power_frame() -> [u8; 13] {
        [
            0xAA, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x2C, 0x00, 0x02, 0x01, 0x02,
        ]
    }

    fn test_config() -> ControllerConfig {
        ControllerConfig {
            backlight_enabled: false,
            ..ControllerConfig::default()
        }
    }

    #[tokio::test]
    async fn send_command_writes_the_template() {
        let (ours, mut theirs) = duplex(256);
        let mut controller =
            AsyncDeviceController::with_transport(ours, test_config()).unwrap();
        controller
            .send_command(Command::ReadPowerAdcFrequency)
            .await
            .unwrap();

        let mut buf = [0u8; 13];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, Command::ReadPowerAdcFrequency.template());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_observes_and_clears_the_flag() {
        let (ours, mut theirs) = duplex(256);
        let mut controller =
            AsyncDeviceController::with_transport(ours, test_config()).unwrap();

        theirs.write_all(&power_frame()).await.unwrap();
        let got = controller
            .wait_for_power_data_change(Duration::from_secs(2))
            .await;
        assert!(got);
        assert!(!controller.state().is_set(StateFlag::PowerData));
        assert_eq!(controller.state().optical_power, Some(300));
        assert_eq!(controller.state().wavelength_nm, Some(1310));
        assert_eq!(controller.state().battery_percent, Some(50));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_data() {
        let (ours, _theirs) = duplex(256);
        let mut controller =
            AsyncDeviceController::with_transport(ours, test_config()).unwrap();

        let got = controller
            .wait_for_power_data_change(Duration::from_millis(50))
            .await;
        assert!(!got);
        assert_eq!(controller.state().optical_power, None);
    }

    #[tokio::test(start_paused = true)]
    async fn update_round_trips_against_a_responder() {
        let (ours, mut theirs) = duplex(256);
        let mut controller =
            AsyncDeviceController::with_transport(ours, test_config()).unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 13];
            theirs.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf[0], 0xAA);
            theirs.write_all(&power_frame()).await.unwrap();
            theirs
        });

        let answered = controller.update().await.unwrap();
        assert!(answered);
        assert!(controller.last_response_time_ms().is_some());
        assert_eq!(controller.state().optical_power, Some(300));
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn background_poller_stops_cooperatively() {
        let (ours, mut theirs) = duplex(1024);
        let controller = AsyncDeviceController::with_transport(ours, test_config()).unwrap();

        // Echo responder: answer every power request with the same frame.
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 13];
            while theirs.read_exact(&mut buf).await.is_ok() {
                if theirs.write_all(&power_frame()).await.is_err() {
                    break;
                }
            }
        });

        let poller = AsyncBackgroundPoller::spawn(controller);
        // Let a few cycles run.
        sleep(Duration::from_millis(100)).await;
        let controller = poller.stop().await;
        assert_eq!(controller.state().optical_power, Some(300));
        drop(controller);
        responder.abort();
    }
}
