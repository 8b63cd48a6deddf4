//! Condition waiting
//!
//! Lets a caller synchronously observe the effect of an asynchronous
//! exchange: poll the receive pipeline until the selected changed flag is
//! set or a timeout elapses. This is the only place flags are cleared, so
//! "set" (decoders) and "clear" (here) never race.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::receiver::FrameReceiver;
use super::state::StateFlag;
use super::transport::Transport;
use super::DEFAULT_POLL_INTERVAL;

/// Polls the receive pipeline for a changed flag
#[derive(Debug, Clone)]
pub struct ConditionWaiter {
    poll_interval: Duration,
}

impl ConditionWaiter {
    /// Waiter with the default 10 ms poll interval
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Waiter with a custom poll interval
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Pump the pipeline until `flag` is observed or `timeout` elapses.
    ///
    /// On success the flag is cleared and `true` returned. A timeout
    /// returns `false` and leaves the state otherwise untouched; callers
    /// decide whether that is an error. Transport errors during pumping are
    /// logged by the receiver; a broken transport simply ends in a timeout.
    pub fn wait_for(
        &self,
        transport: &mut dyn Transport,
        receiver: &mut FrameReceiver,
        flag: StateFlag,
        timeout: Duration,
    ) -> bool {
        let start = Instant::now();
        loop {
            // Pump errors are not fatal here; the deadline still applies.
            if let Err(e) = receiver.pump(transport) {
                debug!(error = %e, "pump failed while waiting");
            }
            if receiver.state.is_set(flag) {
                receiver.state.clear(flag);
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl Default for ConditionWaiter {
    fn default() -> Self {
        Self::new()
    }
}
