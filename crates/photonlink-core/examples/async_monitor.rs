//! Async Power Monitor Demo
//!
//! Same readings loop as the monitor example, driven from a tokio task with
//! the background poller. Discovers a real meter on the serial ports.
//!
//! Usage:
//!   cargo run --example async_monitor

use std::time::Duration;

use anyhow::Result;
use photonlink_core::protocol::{
    AsyncBackgroundPoller, AsyncDeviceController, ControllerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photonlink_core=debug".into()),
        )
        .init();

    let config = ControllerConfig {
        connect_timeout: Duration::from_secs(30),
        ..ControllerConfig::default()
    };
    let controller = AsyncDeviceController::connect(config).await?;
    println!("connected on {:?}", controller.port_name());

    let poller = AsyncBackgroundPoller::spawn(controller);

    // Let the poller refresh readings for ten seconds.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if poller.is_finished() {
            break;
        }
    }

    let controller = poller.stop().await;
    let state = controller.state();
    println!(
        "last reading: power {:?}, wavelength {:?} nm, battery {:?} %",
        state.optical_power, state.wavelength_nm, state.battery_percent
    );
    controller.disconnect().await;

    Ok(())
}
