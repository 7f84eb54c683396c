// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller tuning.

use std::time::Duration;

use crate::dmx::{DEFAULT_UNKNOWN_BREAKER_POLICY, UnknownBreakerPolicy};

/// Timing and policy for a [`BreakerController`](super::BreakerController).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use savant_energy::controller::ControllerSettings;
/// use savant_energy::dmx::UnknownBreakerPolicy;
///
/// let settings = ControllerSettings::new()
///     .with_cooldown(Duration::from_secs(10))
///     .with_unknown_breaker_policy(UnknownBreakerPolicy::AssumeOff);
///
/// // The reconcile window follows the cooldown unless set explicitly.
/// assert_eq!(settings.reconcile_window(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    cooldown: Duration,
    reconcile_window: Option<Duration>,
    unknown_breaker_policy: UnknownBreakerPolicy,
}

impl ControllerSettings {
    /// Minimum time between two frame writes.
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

    /// Creates settings with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cooldown: Self::DEFAULT_COOLDOWN,
            reconcile_window: None,
            unknown_breaker_policy: DEFAULT_UNKNOWN_BREAKER_POLICY,
        }
    }

    /// Sets the global switch cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets how long after a command telemetry may not override it.
    #[must_use]
    pub fn with_reconcile_window(mut self, window: Duration) -> Self {
        self.reconcile_window = Some(window);
        self
    }

    /// Sets the state assumed for breakers with no known status.
    #[must_use]
    pub fn with_unknown_breaker_policy(mut self, policy: UnknownBreakerPolicy) -> Self {
        self.unknown_breaker_policy = policy;
        self
    }

    /// Returns the global switch cooldown.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns the reconcile window, which defaults to the cooldown.
    #[must_use]
    pub fn reconcile_window(&self) -> Duration {
        self.reconcile_window.unwrap_or(self.cooldown)
    }

    /// Returns the unknown-breaker policy.
    #[must_use]
    pub fn unknown_breaker_policy(&self) -> UnknownBreakerPolicy {
        self.unknown_breaker_policy
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::new()
    }
}
