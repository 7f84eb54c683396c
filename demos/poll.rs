// SPDX-License-Identifier: MPL-2.0

//! Breaker monitor example.
//!
//! Loads a JSON configuration, polls the energy controller on the configured
//! interval and prints every breaker after each poll. Controller events
//! (state changes, rate limits, failures) are printed as they arrive.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example poll -- <config.json>
//! ```
//!
//! # Example
//!
//! ```bash
//! echo '{"address": "192.168.1.108", "dmx_testing_mode": true}' > savant.json
//! RUST_LOG=savant_energy=debug cargo run --example poll -- savant.json
//! ```

use std::env;
use std::sync::Arc;

use savant_energy::{BreakerController, DeviceRegistry, SavantConfig, SnapshotPoller};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        std::process::exit(1);
    }

    let config = SavantConfig::from_json_file(&args[1])?;

    println!("=== Savant Energy Monitor ===");
    println!("Controller: {}:{}", config.address, config.port);
    println!("Gateway:    {}", config.gateway_config().base_url());
    println!("Interval:   {}s", config.scan_interval_secs);
    if config.dmx_testing_mode {
        println!("DMX testing mode: commands are logged, not sent");
    }
    println!();

    let registry = Arc::new(DeviceRegistry::new());
    let controller = Arc::new(BreakerController::from_config(&config, Arc::clone(&registry))?);
    let poller = SnapshotPoller::from_config(&config, Arc::clone(&registry))
        .with_controller(Arc::clone(&controller));

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("[event] {event}");
        }
    });

    let mut ticker = tokio::time::interval(config.scan_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        if let Err(e) = poller.poll_once().await {
            println!("Poll failed: {e} (showing last known readings)");
        }

        for breaker in registry.breakers() {
            let demand = breaker.demand();
            let state = match controller.is_on(breaker.uid()) {
                Some(true) => "ON ",
                Some(false) => "OFF",
                None => "?  ",
            };
            let address = breaker
                .dmx_address()
                .map_or_else(|| "-".to_string(), |a| a.to_string());

            println!(
                "{state} {:<24} {:>7} W  {:>6} V  DMX {:>3}  {}",
                breaker.name(),
                demand
                    .power_watts()
                    .map_or_else(|| "-".to_string(), |w| w.to_string()),
                demand
                    .voltage
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.0}")),
                address,
                demand.model(),
            );
        }

        let stats = controller.api_stats();
        println!(
            "gateway: {} requests, {} failures, {:.1}% success, available: {}",
            stats.request_count,
            stats.failure_count,
            stats.success_rate,
            controller.is_api_available()
        );
        if let Some(preview) = controller.command_preview() {
            println!("current frame: {preview}");
        }
        println!();
    }

    Ok(())
}
