//! Transport abstraction
//!
//! Decouples the engine from the serialport crate so discovery, the receive
//! pump and the controller can run against fakes and the simulated meter.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::serial::{clear_buffers, configure_port, list_ports, open_port};
use super::ProtocolError;

/// A byte transport to one meter
pub trait Transport: Read + Write + Send + std::fmt::Debug {
    /// Set the timeout for blocking reads
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Number of bytes available to read without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Discard any unread input
    fn clear_input_buffer(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing `Transport`
#[derive(Debug)]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Wrap an already-opened serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Opens transports for discovery and enumerates candidates
pub trait TransportFactory {
    /// Candidate port names in probe order
    fn candidates(&self) -> Vec<String>;

    /// Open a transport on one candidate
    fn open(&self, port_name: &str) -> Result<Box<dyn Transport>, ProtocolError>;
}

/// The real factory: system serial ports at the meter's baud rate
pub struct SerialTransportFactory {
    baud_rate: u32,
}

impl SerialTransportFactory {
    /// Factory opening ports at the given baud rate
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl TransportFactory for SerialTransportFactory {
    fn candidates(&self) -> Vec<String> {
        list_ports().into_iter().map(|p| p.name).collect()
    }

    fn open(&self, port_name: &str) -> Result<Box<dyn Transport>, ProtocolError> {
        let mut port = open_port(port_name, Some(self.baud_rate))?;
        configure_port(port.as_mut())?;
        clear_buffers(port.as_mut())?;
        Ok(Box::new(SerialTransport::new(port)))
    }
}
