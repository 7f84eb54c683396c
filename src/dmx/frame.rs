// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dense DMX frames.
//!
//! The gateway only accepts full frames: every write describes every address
//! from 1 to the highest one in use. There is no delta update, so a frame is
//! rebuilt from scratch for each command.

use std::collections::BTreeMap;

use crate::types::DmxAddress;

/// Channel level for a closed relay.
pub const DMX_ON: u8 = 255;

/// Channel level for an open relay.
pub const DMX_OFF: u8 = 0;

/// Converts an on/off state into a channel level.
#[must_use]
pub const fn level(on: bool) -> u8 {
    if on { DMX_ON } else { DMX_OFF }
}

/// State assumed for a breaker whose relay status is not known when a full
/// frame has to be reconstructed.
///
/// A full-frame write for one breaker also rewrites every other breaker, so
/// a breaker with no confirmed status must be given some value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownBreakerPolicy {
    /// Keep untracked circuits energized.
    #[default]
    #[serde(alias = "on")]
    AssumeOn,
    /// Open untracked circuits.
    #[serde(alias = "off")]
    AssumeOff,
}

impl UnknownBreakerPolicy {
    /// Resolves an optional state under this policy.
    #[must_use]
    pub fn resolve(self, state: Option<bool>) -> bool {
        state.unwrap_or(matches!(self, Self::AssumeOn))
    }
}

/// Policy used unless configured otherwise.
pub const DEFAULT_UNKNOWN_BREAKER_POLICY: UnknownBreakerPolicy = UnknownBreakerPolicy::AssumeOn;

/// One full DMX frame: slot `i` holds the level for address `i + 1`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use savant_energy::dmx::DmxFrame;
/// use savant_energy::types::DmxAddress;
///
/// let mut states = BTreeMap::new();
/// states.insert(DmxAddress::new(1).unwrap(), true);
/// states.insert(DmxAddress::new(3).unwrap(), true);
///
/// let frame = DmxFrame::build(&states, Some((DmxAddress::new(3).unwrap(), false)));
/// assert_eq!(frame.to_data(), "255,0,0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DmxFrame {
    levels: Vec<u8>,
}

impl DmxFrame {
    /// Builds a frame from known states plus an optional override.
    ///
    /// The frame is as long as the highest address among `states` and the
    /// override. Addresses nobody mentions are OFF. The override is applied
    /// last and always wins.
    #[must_use]
    pub fn build(
        states: &BTreeMap<DmxAddress, bool>,
        target: Option<(DmxAddress, bool)>,
    ) -> Self {
        let highest = states
            .keys()
            .copied()
            .chain(target.map(|(address, _)| address))
            .max();

        let Some(highest) = highest else {
            return Self::default();
        };

        let mut levels = vec![DMX_OFF; usize::from(highest.value())];
        for (address, on) in states {
            levels[address.slot()] = level(*on);
        }
        if let Some((address, on)) = target {
            levels[address.slot()] = level(on);
        }

        Self { levels }
    }

    /// Builds a frame with every address from 1 to `last` ON.
    #[must_use]
    pub fn all_on(last: DmxAddress) -> Self {
        Self {
            levels: vec![DMX_ON; usize::from(last.value())],
        }
    }

    /// Wraps raw levels.
    #[must_use]
    pub fn from_levels(levels: Vec<u8>) -> Self {
        Self { levels }
    }

    /// Returns the number of addresses described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` if the frame describes no address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns the raw levels.
    #[must_use]
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Returns the level for an address, or `None` past the end.
    #[must_use]
    pub fn level_at(&self, address: DmxAddress) -> Option<u8> {
        self.levels.get(address.slot()).copied()
    }

    /// Returns the levels as strings, one per address.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.levels.iter().map(ToString::to_string).collect()
    }

    /// Renders the comma-joined `d=` parameter of a `set_dmx` write.
    #[must_use]
    pub fn to_data(&self) -> String {
        self.values().join(",")
    }
}
