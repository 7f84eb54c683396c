// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire clients for the two devices this library talks to.
//!
//! # Protocols
//!
//! - [`SnapshotClient`]: raw TCP connection to the energy controller, one
//!   snapshot per connection
//! - [`GatewayClient`]: HTTP client for the OLA lighting gateway that drives
//!   the relay bank over DMX

mod gateway;
mod snapshot;

pub use gateway::{DMX_OUTPUT_UNIVERSE, GatewayClient, GatewayConfig};
pub use snapshot::{SnapshotClient, SnapshotConfig};
