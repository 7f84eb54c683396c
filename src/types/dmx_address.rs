// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DMX channel address type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A DMX channel address within one universe (1-512).
///
/// Addresses are 1-based on the wire and in RDM responses; frame slots are
/// 0-based, see [`slot`](Self::slot).
///
/// # Examples
///
/// ```
/// use savant_energy::types::DmxAddress;
///
/// let addr = DmxAddress::new(12).unwrap();
/// assert_eq!(addr.value(), 12);
/// assert_eq!(addr.slot(), 11);
///
/// assert!(DmxAddress::new(0).is_err());
/// assert!(DmxAddress::new(513).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct DmxAddress(u16);

impl DmxAddress {
    /// Lowest valid address.
    pub const MIN: Self = Self(1);

    /// Highest valid address (one full universe).
    pub const MAX: Self = Self(512);

    /// Creates a new address.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if the address is outside 1-512.
    pub fn new(value: u16) -> Result<Self, ValueError> {
        if value < Self::MIN.0 || value > Self::MAX.0 {
            return Err(ValueError::OutOfRange {
                min: Self::MIN.0,
                max: Self::MAX.0,
                actual: u32::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Returns the 1-based address.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Returns the 0-based frame slot for this address.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.0 as usize - 1
    }

    /// Iterates over every address from 1 up to and including `last`.
    pub fn range_to(last: Self) -> impl Iterator<Item = Self> {
        (Self::MIN.0..=last.0).map(Self)
    }
}

impl fmt::Display for DmxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for DmxAddress {
    type Error = ValueError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for DmxAddress {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let narrowed = u16::try_from(value).map_err(|_| ValueError::OutOfRange {
            min: Self::MIN.0,
            max: Self::MAX.0,
            actual: u32::try_from(value).unwrap_or(u32::MAX),
        })?;
        Self::new(narrowed)
    }
}

impl From<DmxAddress> for u16 {
    fn from(address: DmxAddress) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(DmxAddress::new(1).is_ok());
        assert!(DmxAddress::new(512).is_ok());
    }

    #[test]
    fn zero_is_rejected() {
        assert_eq!(
            DmxAddress::new(0),
            Err(ValueError::OutOfRange {
                min: 1,
                max: 512,
                actual: 0
            })
        );
    }

    #[test]
    fn negative_i64_is_rejected() {
        assert!(DmxAddress::try_from(-3_i64).is_err());
        assert!(DmxAddress::try_from(70_000_i64).is_err());
        assert_eq!(DmxAddress::try_from(7_i64).unwrap().value(), 7);
    }

    #[test]
    fn range_to_covers_all_addresses() {
        let last = DmxAddress::new(4).unwrap();
        let values: Vec<u16> = DmxAddress::range_to(last).map(|a| a.value()).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn deserialize_validates() {
        let ok: DmxAddress = serde_json::from_str("17").unwrap();
        assert_eq!(ok.value(), 17);
        assert!(serde_json::from_str::<DmxAddress>("0").is_err());
    }
}
