//! Power Monitor Demo
//!
//! Polls a meter and prints the readings. Runs against the simulated meter
//! by default; pass --serial to discover a real device instead.
//!
//! Usage:
//!   cargo run --example monitor -- [OPTIONS]
//!
//! Options:
//!   --serial          Discover a real meter on the serial ports
//!   --cycles N        Number of update cycles to run (default: 20)

use std::time::Duration;

use anyhow::Result;
use photonlink_core::demo::SimulatedMeter;
use photonlink_core::protocol::{ControllerConfig, DeviceController};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photonlink_core=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let use_serial = args.iter().any(|a| a == "--serial");
    let cycles = args
        .iter()
        .position(|a| a == "--cycles")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);

    let mut controller = if use_serial {
        let config = ControllerConfig {
            connect_timeout: Duration::from_secs(30),
            ..ControllerConfig::default()
        };
        DeviceController::connect(config)?
    } else {
        println!("no --serial flag, using the simulated meter");
        let config = ControllerConfig {
            backlight_enabled: false,
            ..ControllerConfig::default()
        };
        DeviceController::with_transport(Box::new(SimulatedMeter::new()), config)?
    };

    for _ in 0..cycles {
        if !controller.update()? {
            println!("meter did not answer in time");
            continue;
        }
        let state = controller.state();
        println!(
            "{:>7.2} ms | power: {:?} | wavelength: {:?} nm | battery: {:?} % | adc: {:?} | ref: {:?}",
            controller.last_response_time_ms().unwrap_or_default(),
            state.optical_power,
            state.wavelength_nm,
            state.battery_percent,
            state.adc_value,
            state.reference_power,
        );
    }

    Ok(())
}
