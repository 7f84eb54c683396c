// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DMX command engine.
//!
//! Breaker relays sit on a DMX universe behind an OLA gateway. This module
//! builds full frames, writes them, discovers addresses and reads levels
//! back. Every gateway call is counted in a shared [`DmxApiStats`].

mod frame;
mod resolver;
mod sender;
mod stats;
mod status;

pub use frame::{
    DEFAULT_UNKNOWN_BREAKER_POLICY, DMX_OFF, DMX_ON, DmxFrame, UnknownBreakerPolicy, level,
};
pub use resolver::{DEFAULT_ADDRESS_TTL, DmxAddressResolver};
pub use sender::DmxCommandSender;
pub use stats::{ApiStatsSnapshot, DEFAULT_LIVENESS_WINDOW, DmxApiStats};
pub use status::DmxStatusReader;
