//! Receive pipeline
//!
//! Bundles the assembler, the decoder registry and the device state into
//! the one unit the controller and the waiters pump. A pump drains whatever
//! the transport has buffered, slices it into frames and dispatches each
//! one. Invalid frames and frames without a decoder are logged and dropped;
//! only transport errors surface to the caller.

use std::io::Read;

use tracing::warn;

use super::assembler::FrameAssembler;
use super::decoders::DecoderRegistry;
use super::state::DeviceState;
use super::transport::Transport;
use super::{validator, ProtocolError};

/// Assembler, registry and state of one controller
pub struct FrameReceiver {
    /// Reassembly buffer for the byte stream
    pub assembler: FrameAssembler,
    /// Decoders keyed by header codes
    pub registry: DecoderRegistry,
    /// Last-known readings
    pub state: DeviceState,
}

impl FrameReceiver {
    /// Build a receiver around a registry
    pub fn new(registry: DecoderRegistry) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            registry,
            state: DeviceState::new(),
        }
    }

    /// One non-blocking pump: drain available bytes, dispatch every
    /// complete frame. Returns how many frames a decoder handled.
    pub fn pump(&mut self, transport: &mut dyn Transport) -> Result<usize, ProtocolError> {
        let mut chunk = [0u8; 64];
        loop {
            let available = transport.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }
            let to_read = available.min(chunk.len());
            let n = match transport.read(&mut chunk[..to_read]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            };
            self.assembler.feed(&chunk[..n]);
        }
        self.dispatch_buffered()
    }

    /// Dispatch every frame currently sitting in the assembler
    pub fn dispatch_buffered(&mut self) -> Result<usize, ProtocolError> {
        let mut handled = 0;
        while let Some(frame) = self.assembler.try_extract_frame() {
            if let Err(e) = validator::check_start_byte(&frame) {
                warn!(error = %e, "discarding invalid frame");
                continue;
            }
            match self.registry.dispatch(&mut self.state, &frame) {
                Ok(true) => handled += 1,
                Ok(false) => {
                    warn!(
                        function_code = frame.function_code(),
                        sub_function_code = frame.sub_function_code(),
                        "unhandled frame"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "decoder failed, frame dropped");
                }
            }
        }
        Ok(handled)
    }
}
