//! Port discovery against scripted fake transports

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use photonlink_core::protocol::{discovery, Command, ProtocolError, Transport, TransportFactory};

/// What a fake port does when probed
#[derive(Clone)]
enum PortScript {
    /// Opening the port fails
    FailOpen,
    /// Opens fine but never answers
    Silent,
    /// Answers with the given bytes
    Respond(Vec<u8>),
}

struct FakePort {
    name: String,
    script: PortScript,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct FakeTransport {
    response: Vec<u8>,
    read_pos: usize,
    closed: Arc<AtomicUsize>,
}

impl Drop for FakeTransport {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Read for FakeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.response[self.read_pos..];
        let n = buf.len().min(remaining.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Write for FakeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for FakeTransport {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok((self.response.len() - self.read_pos) as u32)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.read_pos = self.response.len();
        Ok(())
    }
}

struct FakeFactory {
    ports: Vec<FakePort>,
}

impl FakeFactory {
    fn new(scripts: Vec<(&str, PortScript)>) -> Self {
        let ports = scripts
            .into_iter()
            .map(|(name, script)| FakePort {
                name: name.to_string(),
                script,
                opened: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            })
            .collect();
        Self { ports }
    }

    fn port(&self, name: &str) -> &FakePort {
        self.ports
            .iter()
            .find(|p| p.name == name)
            .expect("unknown fake port")
    }
}

impl TransportFactory for FakeFactory {
    fn candidates(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name.clone()).collect()
    }

    fn open(&self, port_name: &str) -> Result<Box<dyn Transport>, ProtocolError> {
        let port = self.port(port_name);
        port.opened.fetch_add(1, Ordering::SeqCst);
        match &port.script {
            PortScript::FailOpen => {
                // No transport was created, count the attempt as closed.
                port.closed.fetch_add(1, Ordering::SeqCst);
                Err(ProtocolError::SerialError(format!(
                    "cannot open {port_name}"
                )))
            }
            PortScript::Silent => Ok(Box::new(FakeTransport {
                response: Vec::new(),
                read_pos: 0,
                closed: Arc::clone(&port.closed),
            })),
            PortScript::Respond(bytes) => Ok(Box::new(FakeTransport {
                response: bytes.clone(),
                read_pos: 0,
                closed: Arc::clone(&port.closed),
            })),
        }
    }
}

fn valid_probe_response() -> Vec<u8> {
    let mut raw = vec![0u8; 13];
    raw[0] = 0xAA;
    raw[1] = 0x01;
    raw[2] = 0x00;
    raw
}

fn bad_start_response() -> Vec<u8> {
    let mut raw = valid_probe_response();
    raw[0] = 0x55;
    raw
}

#[test]
fn probe_finds_the_third_candidate_and_closes_everything() {
    let factory = FakeFactory::new(vec![
        ("/dev/ttyACM0", PortScript::Silent),
        ("/dev/ttyACM1", PortScript::Respond(bad_start_response())),
        ("/dev/ttyUSB0", PortScript::Respond(valid_probe_response())),
    ]);

    let found = discovery::probe(
        &factory,
        &factory.candidates(),
        Command::ReadPowerAdcFrequency,
    );
    assert_eq!(found.as_deref(), Some("/dev/ttyUSB0"));

    for name in ["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyUSB0"] {
        let port = factory.port(name);
        assert_eq!(port.opened.load(Ordering::SeqCst), 1, "{name} opened");
        assert_eq!(port.closed.load(Ordering::SeqCst), 1, "{name} closed");
    }
}

#[test]
fn probe_survives_open_failures() {
    let factory = FakeFactory::new(vec![
        ("/dev/ttyACM0", PortScript::FailOpen),
        ("/dev/ttyACM1", PortScript::Respond(valid_probe_response())),
    ]);

    let found = discovery::probe(
        &factory,
        &factory.candidates(),
        Command::ReadPowerAdcFrequency,
    );
    assert_eq!(found.as_deref(), Some("/dev/ttyACM1"));
}

#[test]
fn probe_rejects_wrong_function_code() {
    let mut response = valid_probe_response();
    response[1] = 0x02;
    let factory = FakeFactory::new(vec![("/dev/ttyACM0", PortScript::Respond(response))]);

    let found = discovery::probe(
        &factory,
        &factory.candidates(),
        Command::ReadPowerAdcFrequency,
    );
    assert_eq!(found, None);
}

#[test]
fn probe_requires_a_full_frame() {
    let factory = FakeFactory::new(vec![(
        "/dev/ttyACM0",
        PortScript::Respond(valid_probe_response()[..7].to_vec()),
    )]);

    let found = discovery::probe(
        &factory,
        &factory.candidates(),
        Command::ReadPowerAdcFrequency,
    );
    assert_eq!(found, None);
}

#[test]
fn connect_returns_port_and_open_transport() {
    let factory = FakeFactory::new(vec![
        ("/dev/ttyACM0", PortScript::Silent),
        ("/dev/ttyACM1", PortScript::Respond(valid_probe_response())),
    ]);

    let (port_name, _transport) = discovery::connect(
        &factory,
        Command::ReadPowerAdcFrequency,
        Duration::from_secs(5),
    )
    .expect("connects");
    assert_eq!(port_name, "/dev/ttyACM1");
    // Probe opened it once, connect reopened it for the controller.
    assert_eq!(
        factory.port("/dev/ttyACM1").opened.load(Ordering::SeqCst),
        2
    );
}

#[test]
fn connect_times_out_when_nothing_answers() {
    let factory = FakeFactory::new(vec![("/dev/ttyACM0", PortScript::Silent)]);

    let err = discovery::connect(
        &factory,
        Command::ReadPowerAdcFrequency,
        Duration::from_millis(200),
    )
    .unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionTimeout));
}
