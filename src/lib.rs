// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `savant_energy` - async client for Savant energy controllers and their
//! DMX relay banks.
//!
//! The energy controller publishes a snapshot of every breaker on a raw TCP
//! socket. Breaker relays are switched through an OLA lighting gateway that
//! speaks DMX over HTTP. This library decodes the snapshots and drives the
//! relays.
//!
//! # Features
//!
//! - **Snapshot decoding**: marker-framed, base64-encoded JSON over TCP, with
//!   selectable framing rules
//! - **Breaker registry**: typed per-breaker readings keyed by controller UID
//! - **DMX engine**: address discovery with a TTL cache, full-frame writes,
//!   call statistics and a dry-run mode
//! - **Breaker control**: a global switch cooldown, reconciliation with
//!   telemetry, scenes and an "all loads on" command
//! - **Events**: rate-limit and state-change notifications over a broadcast
//!   channel
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use savant_energy::{BreakerController, DeviceRegistry, SavantConfig, SnapshotPoller};
//!
//! #[tokio::main]
//! async fn main() -> savant_energy::Result<()> {
//!     let config = SavantConfig::new("192.168.1.108").with_dmx_testing_mode(true);
//!
//!     let registry = Arc::new(DeviceRegistry::new());
//!     let controller = Arc::new(BreakerController::from_config(&config, Arc::clone(&registry))?);
//!     let poller = SnapshotPoller::from_config(&config, Arc::clone(&registry))
//!         .with_controller(Arc::clone(&controller));
//!
//!     poller.poll_once().await?;
//!     for breaker in registry.breakers() {
//!         println!("{}: {:?}", breaker.name(), breaker.relay_state());
//!     }
//!
//!     let outcome = controller.turn_off("1234567890.1").await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! ```no_run
//! use savant_energy::{BreakerController, ControllerEvent};
//!
//! fn watch(controller: &BreakerController) {
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let ControllerEvent::RateLimited { .. } = &event {
//!                 eprintln!("{event}");
//!             }
//!         }
//!     });
//! }
//! ```

pub mod config;
pub mod controller;
pub mod dmx;
pub mod error;
pub mod event;
pub mod poller;
pub mod protocol;
pub mod registry;
pub mod telemetry;
pub mod types;

pub use config::SavantConfig;
pub use controller::{
    BreakerControlState, BreakerController, BreakerPhase, BulkOutcome, ControllerSettings,
    ToggleOutcome,
};
pub use dmx::{
    ApiStatsSnapshot, DmxAddressResolver, DmxApiStats, DmxCommandSender, DmxFrame,
    DmxStatusReader, UnknownBreakerPolicy,
};
pub use error::{
    CommandError, ConfigError, ConnectionError, DecodeError, Error, ResolutionError, Result,
    ValueError,
};
pub use event::{ControllerEvent, EventBus};
pub use poller::SnapshotPoller;
pub use protocol::{GatewayClient, GatewayConfig, SnapshotClient, SnapshotConfig};
pub use registry::{BreakerEntry, DeviceRegistry};
pub use telemetry::{BreakerDemand, Framing, TelemetryDocument};
pub use types::{BreakerModel, DmxAddress, DmxUid};
