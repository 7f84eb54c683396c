// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-breaker control state and command outcomes.

use std::time::{Duration, Instant};

use crate::types::DmxAddress;

/// Where a breaker stands in address discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerPhase {
    /// No DMX address known yet.
    #[default]
    Unknown,
    /// Address discovered; the breaker can be commanded.
    Ready(DmxAddress),
}

/// What the controller believes about one breaker.
///
/// Created lazily when the breaker is first commanded or its address is
/// first discovered, and kept for the lifetime of the controller. Until then
/// the registry's reading stands in for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakerControlState {
    pub(crate) phase: BreakerPhase,
    pub(crate) last_commanded_on: Option<bool>,
    pub(crate) last_command_at: Option<Instant>,
}

impl BreakerControlState {
    /// Returns the discovery phase.
    #[must_use]
    pub fn phase(&self) -> BreakerPhase {
        self.phase
    }

    /// Returns the DMX address once discovered.
    #[must_use]
    pub fn address(&self) -> Option<DmxAddress> {
        match self.phase {
            BreakerPhase::Ready(address) => Some(address),
            BreakerPhase::Unknown => None,
        }
    }

    /// Returns the believed relay state.
    ///
    /// Set by successful commands and by reconciliation with telemetry.
    #[must_use]
    pub fn last_commanded_on(&self) -> Option<bool> {
        self.last_commanded_on
    }

    /// Returns when the last successful command for this breaker was sent.
    #[must_use]
    pub fn last_command_at(&self) -> Option<Instant> {
        self.last_command_at
    }

    /// Returns `true` if a command was sent less than `window` ago.
    #[must_use]
    pub fn commanded_within(&self, window: Duration) -> bool {
        self.last_command_at.is_some_and(|at| at.elapsed() < window)
    }
}

/// Result of a single-breaker command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A frame was written and the breaker is now believed to be `on`.
    Switched {
        /// New state.
        on: bool,
    },
    /// The breaker is already believed to be in the requested state.
    Unchanged,
    /// The global cooldown is active; nothing was sent.
    RateLimited {
        /// Time until the next command is accepted.
        retry_after: Duration,
    },
}

impl ToggleOutcome {
    /// Returns `true` if a frame was written.
    #[must_use]
    pub fn is_switched(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }

    /// Returns `true` if the cooldown rejected the command.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result of a command covering many breakers (scenes, all loads on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    /// A frame describing `channels` addresses was written.
    Sent {
        /// Frame length.
        channels: usize,
    },
    /// The global cooldown is active; nothing was sent.
    RateLimited {
        /// Time until the next command is accepted.
        retry_after: Duration,
    },
}

impl BulkOutcome {
    /// Returns `true` if the cooldown rejected the command.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
