//! Frame validation
//!
//! Two levels of checking. `check_frame` applies the checks every received
//! frame must pass (length, start marker) and is what the free-running
//! receive path uses; the header codes are then only a registry lookup key.
//! `check_response` additionally pins the function and sub-function codes
//! and is used where a specific response is expected, such as port probing.
//!
//! Checks run in a fixed order: length, start byte, function code,
//! sub-function code. The first failure wins.

use super::frame::Frame;
use super::{ProtocolError, START_BYTE};

/// Validate length and start marker, returning the parsed frame
pub fn check_frame(data: &[u8]) -> Result<Frame, ProtocolError> {
    let frame = Frame::from_bytes(data)?;
    if !frame.has_start_byte() {
        return Err(ProtocolError::StartByte {
            actual: frame.start_byte(),
        });
    }
    Ok(frame)
}

/// Validate a frame that must answer a specific request
pub fn check_response(
    data: &[u8],
    expected_function_code: u8,
    expected_sub_function_code: u8,
) -> Result<Frame, ProtocolError> {
    let frame = check_frame(data)?;
    if frame.function_code() != expected_function_code {
        return Err(ProtocolError::FunctionCode {
            expected: expected_function_code,
            actual: frame.function_code(),
        });
    }
    if frame.sub_function_code() != expected_sub_function_code {
        return Err(ProtocolError::SubFunctionCode {
            expected: expected_sub_function_code,
            actual: frame.sub_function_code(),
        });
    }
    Ok(frame)
}

/// Validate an already-sliced frame's start marker
pub fn check_start_byte(frame: &Frame) -> Result<(), ProtocolError> {
    if frame.start_byte() != START_BYTE {
        return Err(ProtocolError::StartByte {
            actual: frame.start_byte(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_frame() -> Vec<u8> {
        let mut raw = vec![0u8; 13];
        raw[0] = 0xAA;
        raw[1] = 0x01;
        raw[2] = 0x80;
        raw
    }

    #[test]
    fn accepts_valid_frame() {
        let frame = check_response(&valid_frame(), 0x01, 0x80).unwrap();
        assert_eq!(frame.function_code(), 0x01);
    }

    #[test]
    fn length_is_checked_before_start_byte() {
        // Wrong length and wrong start marker: the length error must win.
        let err = check_response(&[0x55u8; 7], 0x01, 0x80).unwrap_err();
        assert!(matches!(err, ProtocolError::Length { actual: 7 }));
    }

    #[test]
    fn rejects_wrong_start_byte() {
        let mut raw = valid_frame();
        raw[0] = 0x55;
        let err = check_response(&raw, 0x01, 0x80).unwrap_err();
        assert!(matches!(err, ProtocolError::StartByte { actual: 0x55 }));
    }

    #[test]
    fn rejects_wrong_function_code() {
        let err = check_response(&valid_frame(), 0x02, 0x80).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FunctionCode {
                expected: 0x02,
                actual: 0x01
            }
        ));
    }

    #[test]
    fn rejects_wrong_sub_function_code() {
        let err = check_response(&valid_frame(), 0x01, 0x00).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::SubFunctionCode {
                expected: 0x00,
                actual: 0x80
            }
        ));
    }

    #[test]
    fn free_running_check_ignores_codes() {
        // Any codes pass as long as length and start byte are right.
        let mut raw = valid_frame();
        raw[1] = 0x7F;
        raw[2] = 0x7F;
        assert!(check_frame(&raw).is_ok());
    }
}
