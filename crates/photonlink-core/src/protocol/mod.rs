//! Serial Protocol Communication
//!
//! Implements the meter's fixed 13-byte binary protocol: framing,
//! validation, decoder dispatch, port discovery and the wait mechanism that
//! lets callers synchronously observe the effect of an asynchronous
//! exchange. Blocking and async controllers share everything below the
//! transport.

pub mod assembler;
pub mod async_controller;
pub mod commands;
pub mod controller;
pub mod decoders;
pub mod discovery;
mod error;
pub mod frame;
pub mod poller;
pub mod receiver;
pub mod serial;
pub mod state;
pub mod transport;
pub mod validator;
pub mod waiter;

pub use assembler::FrameAssembler;
pub use async_controller::{AsyncBackgroundPoller, AsyncDeviceController};
pub use commands::{Command, CommandKind};
pub use controller::{ControllerConfig, DeviceController};
pub use decoders::{DecoderKey, DecoderRegistry, FrameDecoder};
pub use error::ProtocolError;
pub use frame::Frame;
pub use poller::BackgroundPoller;
pub use receiver::FrameReceiver;
pub use serial::{clear_buffers, configure_port, list_ports, open_port, PortInfo};
pub use state::{DeviceState, StateFlag};
pub use transport::{SerialTransport, SerialTransportFactory, Transport, TransportFactory};
pub use waiter::ConditionWaiter;

use std::time::Duration;

/// Wire frame size in bytes
pub const FRAME_LEN: usize = 13;

/// Start marker every frame begins with
pub const START_BYTE: u8 = 0xAA;

/// Offset of the payload within a frame
pub const PAYLOAD_OFFSET: usize = 5;

/// Baud rate the meter talks at
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Poll interval of the wait loops
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
