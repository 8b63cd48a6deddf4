//! Protocol errors

use thiserror::Error;

use super::FRAME_LEN;

/// Errors that can occur during meter communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame length is {actual} bytes, expected {FRAME_LEN}")]
    Length { actual: usize },

    #[error("start byte is {actual:#04x}, expected 0xAA - device is not compatible")]
    StartByte { actual: u8 },

    #[error("function code mismatch: expected {expected:#04x}, got {actual:#04x}")]
    FunctionCode { expected: u8, actual: u8 },

    #[error("sub-function code mismatch: expected {expected:#04x}, got {actual:#04x}")]
    SubFunctionCode { expected: u8, actual: u8 },

    #[error("unsupported field width: {0} bytes")]
    UnsupportedFieldWidth(usize),

    #[error("decoder already registered for ({function_code:#04x}, {sub_function_code:?})")]
    DuplicateDecoder {
        function_code: u8,
        sub_function_code: Option<u8>,
    },

    #[error("no device found before the connection timeout elapsed")]
    ConnectionTimeout,

    #[error("not connected to a meter")]
    NotConnected,

    #[error("serial port error: {0}")]
    SerialError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error belongs to the frame validation category.
    ///
    /// Validation failures are non-fatal during free-running receive and
    /// count as a single failed attempt during port probing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProtocolError::Length { .. }
                | ProtocolError::StartByte { .. }
                | ProtocolError::FunctionCode { .. }
                | ProtocolError::SubFunctionCode { .. }
        )
    }
}
