// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reads relay states back from the gateway.

use std::collections::HashMap;
use std::sync::Arc;

use super::frame::DMX_OFF;
use super::stats::DmxApiStats;
use crate::protocol::GatewayClient;
use crate::types::DmxAddress;

/// Reads the current level of DMX channels.
///
/// Reads are counted in the same statistics as frame writes.
#[derive(Debug, Clone)]
pub struct DmxStatusReader {
    gateway: GatewayClient,
    stats: Arc<DmxApiStats>,
}

impl DmxStatusReader {
    /// Creates a reader that records into `stats`.
    #[must_use]
    pub fn new(gateway: GatewayClient, stats: Arc<DmxApiStats>) -> Self {
        Self { gateway, stats }
    }

    /// Returns the on/off state of each requested address.
    ///
    /// A channel is ON when its level is non-zero. Addresses past the end of
    /// the universe returned by the gateway are skipped with a warning. On
    /// failure the map is empty.
    pub async fn channel_states(&self, addresses: &[DmxAddress]) -> HashMap<DmxAddress, bool> {
        self.stats.record_request();

        let levels = match self.gateway.get_dmx().await {
            Ok(levels) => {
                self.stats.record_success();
                levels
            }
            Err(err) => {
                self.stats.record_failure();
                tracing::error!(error = %err, "Failed to read DMX levels");
                return HashMap::new();
            }
        };

        let mut states = HashMap::with_capacity(addresses.len());
        for &address in addresses {
            match levels.get(address.slot()) {
                Some(&value) => {
                    states.insert(address, value != DMX_OFF);
                }
                None => {
                    tracing::warn!(
                        address = %address,
                        channels = levels.len(),
                        "DMX address out of range"
                    );
                }
            }
        }
        states
    }
}
