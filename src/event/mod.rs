// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller notifications.
//!
//! The [`EventBus`] fans [`ControllerEvent`]s out to any number of
//! subscribers over a tokio broadcast channel.
//!
//! # Examples
//!
//! ```
//! use savant_energy::event::{ControllerEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ControllerEvent::StateChanged { uid: "1234567890".into(), on: true });
//! assert!(rx.try_recv().is_ok());
//! ```

mod controller_event;
mod event_bus;

pub use controller_event::ControllerEvent;
pub use event_bus::EventBus;
