// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events emitted by the breaker controller.

use std::time::Duration;

use crate::types::DmxUid;

/// Notification about a breaker command or state change.
///
/// Rate-limit rejections are surfaced here so a UI can tell the user how
/// long to wait instead of the command failing silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The believed state of a breaker changed, from a command or a snapshot.
    StateChanged {
        /// Controller UID of the breaker.
        uid: String,
        /// New state.
        on: bool,
    },
    /// A command was rejected by the switch cooldown.
    RateLimited {
        /// Controller UID of the breaker.
        uid: String,
        /// Display name of the breaker.
        name: String,
        /// Whole seconds until the next command is accepted, rounded up.
        retry_after_secs: u64,
    },
    /// A frame write failed.
    CommandFailed {
        /// Controller UID of the breaker, or empty for bulk commands.
        uid: String,
        /// Failure description.
        message: String,
    },
    /// No DMX address could be found for a breaker.
    AddressUnresolved {
        /// Controller UID of the breaker.
        uid: String,
        /// UID used for the RDM lookup.
        dmx_uid: DmxUid,
    },
}

impl ControllerEvent {
    /// Creates a rate-limit event, rounding the wait up to whole seconds.
    #[must_use]
    pub fn rate_limited(uid: impl Into<String>, name: impl Into<String>, wait: Duration) -> Self {
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        Self::RateLimited {
            uid: uid.into(),
            name: name.into(),
            retry_after_secs: secs,
        }
    }

    /// Returns the breaker UID this event concerns.
    #[must_use]
    pub fn uid(&self) -> &str {
        match self {
            Self::StateChanged { uid, .. }
            | Self::RateLimited { uid, .. }
            | Self::CommandFailed { uid, .. }
            | Self::AddressUnresolved { uid, .. } => uid,
        }
    }

    /// Returns `true` for a rate-limit rejection.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateChanged { uid, on } => {
                write!(f, "{uid} is now {}", if *on { "ON" } else { "OFF" })
            }
            Self::RateLimited {
                name,
                retry_after_secs,
                ..
            } => write!(
                f,
                "Please wait {retry_after_secs} seconds before toggling {name} again"
            ),
            Self::CommandFailed { uid, message } => write!(f, "command for {uid} failed: {message}"),
            Self::AddressUnresolved { uid, dmx_uid } => {
                write!(f, "no DMX address for {uid} (DMX UID {dmx_uid})")
            }
        }
    }
}
