// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay hardware models, identified by their rated capacity.

use std::fmt;

/// Relay hardware model.
///
/// The controller does not report a model directly; it is inferred from the
/// breaker's rated capacity in kW.
///
/// # Examples
///
/// ```
/// use savant_energy::types::BreakerModel;
///
/// assert_eq!(BreakerModel::from_capacity(7.2), BreakerModel::Relay30A);
/// assert_eq!(BreakerModel::from_capacity(7.2).as_str(), "30A Relay");
/// assert_eq!(BreakerModel::from_capacity(3.0), BreakerModel::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerModel {
    /// Two 20A relays sharing one unit (2.4 kW).
    DualRelay20A,
    /// 30A relay (7.2 kW).
    Relay30A,
    /// 60A relay (14.4 kW).
    Relay60A,
    /// Capacity does not match a known model.
    Unknown,
}

impl BreakerModel {
    /// Capacity tolerance when matching reported float values.
    const EPSILON: f64 = 1e-6;

    /// Infers the model from a rated capacity in kW.
    #[must_use]
    pub fn from_capacity(capacity_kw: f64) -> Self {
        let matches = |rated: f64| (capacity_kw - rated).abs() < Self::EPSILON;
        if matches(2.4) {
            Self::DualRelay20A
        } else if matches(7.2) {
            Self::Relay30A
        } else if matches(14.4) {
            Self::Relay60A
        } else {
            Self::Unknown
        }
    }

    /// Returns the human-readable model name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DualRelay20A => "Dual 20A Relay",
            Self::Relay30A => "30A Relay",
            Self::Relay60A => "60A Relay",
            Self::Unknown => "Unknown Model",
        }
    }
}

impl fmt::Display for BreakerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
