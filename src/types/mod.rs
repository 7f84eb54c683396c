// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! Each type ensures values are within their valid ranges at construction
//! time.
//!
//! # Types
//!
//! - [`DmxAddress`] - DMX channel address within a universe (1-512)
//! - [`DmxUid`] - RDM identifier derived from a controller device UID
//! - [`BreakerModel`] - Relay hardware model inferred from capacity

mod breaker_model;
mod dmx_address;
mod dmx_uid;

pub use breaker_model::BreakerModel;
pub use dmx_address::DmxAddress;
pub use dmx_uid::DmxUid;
