//! Frame reassembly
//!
//! Turns the chunked byte stream read from the transport into complete
//! 13-byte frames. Bytes are accumulated in a persistent buffer; a frame is
//! sliced off the front whenever at least 13 bytes are available, so partial
//! reads and reads spanning several frames both work.

use tracing::warn;

use super::frame::Frame;
use super::{FRAME_LEN, START_BYTE};

/// Accumulates transport bytes and yields complete frames in order
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    resync: bool,
}

impl FrameAssembler {
    /// Create an assembler with plain positional framing
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler that realigns on the start marker.
    ///
    /// In this mode extraction first discards any leading bytes up to the
    /// next 0xAA, so a spurious byte costs at most one frame instead of
    /// shifting the framing of everything that follows.
    pub fn with_resync() -> Self {
        Self {
            buffer: Vec::new(),
            resync: true,
        }
    }

    /// Append newly read bytes to the buffer. No parsing happens here.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and return the next complete frame, if one is buffered.
    ///
    /// Never blocks. Consecutive extractions never share a byte and frames
    /// come out in the exact order their bytes were fed.
    pub fn try_extract_frame(&mut self) -> Option<Frame> {
        if self.resync {
            self.discard_until_start_marker();
        }
        if self.buffer.len() < FRAME_LEN {
            return None;
        }
        let mut raw = [0u8; FRAME_LEN];
        raw.copy_from_slice(&self.buffer[..FRAME_LEN]);
        self.buffer.drain(..FRAME_LEN);
        Some(Frame::from(raw))
    }

    /// Number of buffered bytes not yet sliced into a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn discard_until_start_marker(&mut self) {
        match self.buffer.iter().position(|&b| b == START_BYTE) {
            Some(0) => {}
            Some(pos) => {
                warn!(discarded = pos, "skipping bytes to realign on start marker");
                self.buffer.drain(..pos);
            }
            None => {
                if !self.buffer.is_empty() {
                    warn!(
                        discarded = self.buffer.len(),
                        "no start marker in buffer, dropping it"
                    );
                    self.buffer.clear();
                }
            }
        }
    }
}
