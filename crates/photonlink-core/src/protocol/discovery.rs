//! Port discovery
//!
//! Finds the serial port a meter is attached to by sending a known probe
//! command to every candidate and validating the answer. Each attempt opens
//! its own transport and closes it again whatever the outcome; the first
//! port that answers correctly wins.

use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::commands::Command;
use super::transport::{Transport, TransportFactory};
use super::{validator, ProtocolError, FRAME_LEN};

/// How long a probed device gets to answer before its port is skipped
pub const PROBE_SETTLE: Duration = Duration::from_millis(300);

/// Pause between discovery sweeps
const SWEEP_DELAY: Duration = Duration::from_millis(500);

/// Probe `candidates` in order and return the first port that answers
/// `probe_command` with a valid response.
///
/// Per-port failures (open errors, short reads, validation errors) are
/// logged and treated as "not this port"; they never abort the sweep.
pub fn probe(
    factory: &dyn TransportFactory,
    candidates: &[String],
    probe_command: Command,
) -> Option<String> {
    for name in candidates {
        debug!(port = %name, "probing");
        match probe_one(factory, name, probe_command) {
            Ok(()) => {
                info!(port = %name, "valid probe response");
                return Some(name.clone());
            }
            Err(e) => {
                debug!(port = %name, error = %e, "probe failed");
            }
        }
    }
    debug!("no port answered the probe");
    None
}

fn probe_one(
    factory: &dyn TransportFactory,
    port_name: &str,
    probe_command: Command,
) -> Result<(), ProtocolError> {
    // The transport drops (and the port closes) on every exit path.
    let mut transport = factory.open(port_name)?;
    transport.write_all(&probe_command.template())?;
    thread::sleep(PROBE_SETTLE);

    let available = transport.bytes_to_read()? as usize;
    if available < FRAME_LEN {
        return Err(ProtocolError::Length { actual: available });
    }

    let mut buf = [0u8; FRAME_LEN];
    transport.read_exact(&mut buf)?;
    validator::check_response(
        &buf,
        probe_command.function_code(),
        probe_command.sub_function_code(),
    )?;
    Ok(())
}

/// Sweep the factory's candidates until a meter is found or `timeout`
/// elapses.
///
/// Returns the winning port name and a freshly opened transport on it.
pub fn connect(
    factory: &dyn TransportFactory,
    probe_command: Command,
    timeout: Duration,
) -> Result<(String, Box<dyn Transport>), ProtocolError> {
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout {
            warn!("connection timeout, no meter found");
            return Err(ProtocolError::ConnectionTimeout);
        }
        let candidates = factory.candidates();
        if let Some(port_name) = probe(factory, &candidates, probe_command) {
            let transport = factory.open(&port_name)?;
            info!(port = %port_name, "connected to meter");
            return Ok((port_name, transport));
        }
        debug!("meter not found, retrying");
        thread::sleep(SWEEP_DELAY);
    }
}
