// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Breaker control.
//!
//! [`BreakerController`] turns on/off requests into DMX frame writes. It
//! combines the registry, the address resolver and the frame sender behind a
//! single global cooldown, and reconciles its believed states with each new
//! snapshot.
//!
//! Per breaker the controller moves from [`BreakerPhase::Unknown`] to
//! [`BreakerPhase::Ready`] once the DMX address is discovered. A failed
//! discovery leaves the breaker `Unknown` and the command fails.

mod breaker_controller;
mod settings;
mod state;

pub use breaker_controller::{BreakerController, DEFAULT_ALL_LOADS_CHANNELS};
pub use settings::ControllerSettings;
pub use state::{BreakerControlState, BreakerPhase, BulkOutcome, ToggleOutcome};
