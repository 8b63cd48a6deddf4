//! Background polling
//!
//! Runs `DeviceController::update` in a loop on its own thread so the
//! readings stay fresh while the caller does other work. The controller
//! moves into the thread, which keeps the one-exchange-at-a-time rule: the
//! loop always finishes its wait before issuing the next command, and the
//! stop signal is honored between cycles, never mid-frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

use super::controller::DeviceController;
use super::ProtocolError;

/// Pause between update cycles
const CYCLE_PAUSE: Duration = Duration::from_millis(1);

/// A controller being polled on a background thread
pub struct BackgroundPoller {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<DeviceController>,
}

impl BackgroundPoller {
    /// Move `controller` to a new thread and start polling
    pub fn spawn(mut controller: DeviceController) -> Result<Self, ProtocolError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("meter-poller".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    if let Err(e) = controller.update() {
                        warn!(error = %e, "update cycle failed");
                    }
                    thread::sleep(CYCLE_PAUSE);
                }
                controller
            })?;
        Ok(Self { stop, handle })
    }

    /// Whether the polling thread has already exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop, let the current cycle finish, and get the
    /// controller back
    pub fn stop(self) -> DeviceController {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.join() {
            Ok(controller) => controller,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
