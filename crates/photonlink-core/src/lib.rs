//! # PhotonLink Core Library
//!
//! Core functionality for the PhotonLink optical power meter software.
//!
//! This library provides:
//! - The meter's 13-byte binary serial protocol (framing, validation,
//!   decoder dispatch)
//! - Serial port discovery for the attached meter
//! - Blocking and async controllers with condition-based waits
//! - A simulated meter for development without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use photonlink_core::protocol::{Command, ControllerConfig, DeviceController};
//! use std::time::Duration;
//!
//! // Find the meter on the system's serial ports and connect.
//! let mut controller = DeviceController::connect(ControllerConfig::default())?;
//!
//! // Ask for a reading and wait until it has been decoded.
//! controller.send_command(Command::ReadPowerWavelengthBattery)?;
//! if controller.wait_for_power_data_change(Duration::from_secs(2)) {
//!     println!("power: {:?}", controller.state().optical_power);
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod demo;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::demo::SimulatedMeter;
    pub use crate::protocol::{
        Command, CommandKind, ConditionWaiter, ControllerConfig, DeviceController, DeviceState,
        ProtocolError, StateFlag,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
